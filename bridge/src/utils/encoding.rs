//! Text encoding at the host boundary.
//!
//! Host engines expect the machine's legacy codepage ("ANSI"), not UTF-8.
//! HTTP inputs arrive as UTF-8 and are transcoded here before they reach
//! the engine; strings read back from the host go the other way. Off
//! Windows there is no legacy codepage and both directions pass through.

#[cfg(windows)]
pub fn utf8_to_ansi(text: &str) -> Vec<u8> {
    use windows::Win32::Globalization::{
        MultiByteToWideChar, WideCharToMultiByte, CP_ACP, CP_UTF8, MULTI_BYTE_TO_WIDE_CHAR_FLAGS,
    };

    if text.is_empty() {
        return Vec::new();
    }

    unsafe {
        // UTF-8 -> UTF-16
        let wide_len = MultiByteToWideChar(
            CP_UTF8,
            MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0),
            text.as_bytes(),
            None,
        );
        if wide_len <= 0 {
            return Vec::new();
        }
        let mut wide = vec![0u16; wide_len as usize];
        MultiByteToWideChar(
            CP_UTF8,
            MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0),
            text.as_bytes(),
            Some(&mut wide),
        );

        // UTF-16 -> ANSI
        let ansi_len = WideCharToMultiByte(CP_ACP, 0, &wide, None, windows::core::PCSTR::null(), None);
        if ansi_len <= 0 {
            return Vec::new();
        }
        let mut ansi = vec![0u8; ansi_len as usize];
        WideCharToMultiByte(
            CP_ACP,
            0,
            &wide,
            Some(&mut ansi),
            windows::core::PCSTR::null(),
            None,
        );
        ansi
    }
}

#[cfg(windows)]
pub fn ansi_to_utf8(bytes: &[u8]) -> String {
    use windows::Win32::Globalization::{
        MultiByteToWideChar, CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS,
    };

    if bytes.is_empty() {
        return String::new();
    }

    unsafe {
        let wide_len = MultiByteToWideChar(CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0), bytes, None);
        if wide_len <= 0 {
            return String::new();
        }
        let mut wide = vec![0u16; wide_len as usize];
        MultiByteToWideChar(
            CP_ACP,
            MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0),
            bytes,
            Some(&mut wide),
        );
        String::from_utf16_lossy(&wide)
    }
}

#[cfg(not(windows))]
pub fn utf8_to_ansi(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

#[cfg(not(windows))]
pub fn ansi_to_utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_survives_both_directions() {
        let ansi = utf8_to_ansi("hello");
        assert_eq!(ansi_to_utf8(&ansi), "hello");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(utf8_to_ansi("").is_empty());
        assert_eq!(ansi_to_utf8(&[]), "");
    }
}
