use anyhow::Result;
use std::{
    ffi::CStr,
    os::raw::c_char,
};

/// Helper function to convert [c_char; SIZE] to string
pub fn convert_char_to_string(raw_string_array: &[c_char]) -> Result<String> {
    let bytes: &[u8] = unsafe {
        std::slice::from_raw_parts(raw_string_array.as_ptr() as *const u8, raw_string_array.len())
    };
    let raw_string = CStr::from_bytes_until_nul(bytes)?;
    Ok(raw_string.to_str()?.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_char_to_string() {
        let mut raw = [0 as c_char; 16];
        for (dst, src) in raw.iter_mut().zip(b"VK_LAYER") {
            *dst = *src as c_char;
        }
        assert_eq!(convert_char_to_string(&raw).unwrap(), "VK_LAYER");
        // no terminator
        let raw = [b'a' as c_char; 4];
        assert!(convert_char_to_string(&raw).is_err());
    }
}
