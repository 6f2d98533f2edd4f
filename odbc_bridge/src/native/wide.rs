use crate::error::{OdbcError, Result};
use std::fmt;
use widestring::U16CString;
use zeroize::Zeroizing;

/// Null-terminated UTF-16 text handed to the native API together with the
/// "null-terminated" length sentinel. Buffers are wiped on drop since
/// connection strings carry credentials.
pub struct WideText {
    units: Zeroizing<Vec<u16>>,
}

impl WideText {
    pub fn new(text: &str) -> Result<Self> {
        let wide = U16CString::from_str(text).map_err(|e| {
            OdbcError::ValidationError(format!(
                "Text contains a NUL character at position {}",
                e.nul_position()
            ))
        })?;
        Ok(Self {
            units: Zeroizing::new(wide.into_vec_with_nul()),
        })
    }

    /// Catalog filter: an empty filter means "unrestricted" and is passed as
    /// a null pointer, never as an empty string.
    pub fn filter(text: &str) -> Result<Option<Self>> {
        if text.is_empty() {
            Ok(None)
        } else {
            Self::new(text).map(Some)
        }
    }

    pub fn as_ptr(&self) -> *const u16 {
        self.units.as_ptr()
    }

    pub fn as_slice_with_nul(&self) -> &[u16] {
        &self.units
    }

    /// Length in code units, terminator excluded.
    pub fn len(&self) -> usize {
        self.units.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.units[..self.len()])
    }
}

impl fmt::Debug for WideText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WideText").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_appends_terminator() {
        let text = WideText::new("DSN=x").unwrap();
        assert_eq!(text.len(), 5);
        assert_eq!(text.as_slice_with_nul().last(), Some(&0));
        assert_eq!(text.to_string_lossy(), "DSN=x");
    }

    #[test]
    fn test_non_ascii_round_trips() {
        let text = WideText::new("tabela_ação").unwrap();
        assert_eq!(text.to_string_lossy(), "tabela_ação");
    }

    #[test]
    fn test_interior_nul_rejected() {
        let err = WideText::new("DSN=a\0b").unwrap_err();
        assert!(matches!(err, OdbcError::ValidationError(_)));
    }

    #[test]
    fn test_empty_filter_is_null() {
        assert!(WideText::filter("").unwrap().is_none());
        let filter = WideText::filter("orders").unwrap().expect("non-empty filter");
        assert_eq!(filter.to_string_lossy(), "orders");
    }

    #[test]
    fn test_debug_hides_contents() {
        let text = WideText::new("PWD=secret").unwrap();
        let debug = format!("{:?}", text);
        assert!(!debug.contains("secret"));
    }
}
