use super::FillError;

/// Ordered, non-empty list of field names to prompt for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList {
    names: Vec<String>,
}

impl FieldList {
    /// Split a whitespace-separated `-f` value into field names
    pub fn parse(raw: &str) -> Result<Self, FillError> {
        let names: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
        if names.is_empty() {
            return Err(FillError::MissingFields);
        }
        Ok(Self { names })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }
}

/// Position within a track's field list.
///
/// Moves forward on values and blanks, backward on `b`, never below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldCursor {
    index: usize,
}

impl FieldCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    /// Step back one field. Returns false when already on the first field.
    pub fn retreat(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn current<'a>(&self, fields: &'a FieldList) -> Option<&'a str> {
        fields.get(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_split_on_any_whitespace() {
        let fields = FieldList::parse("mood  context\tlanguage genre").unwrap();
        assert_eq!(fields.get(0), Some("mood"));
        assert_eq!(fields.get(1), Some("context"));
        assert_eq!(fields.get(2), Some("language"));
        assert_eq!(fields.get(3), Some("genre"));
        assert_eq!(fields.get(4), None);
    }

    #[test]
    fn empty_field_option_is_rejected() {
        assert!(matches!(FieldList::parse(""), Err(FillError::MissingFields)));
        assert!(matches!(FieldList::parse("   "), Err(FillError::MissingFields)));
    }

    #[test]
    fn cursor_never_goes_below_zero() {
        let fields = FieldList::parse("mood context").unwrap();
        let mut cursor = FieldCursor::new();

        assert!(!cursor.retreat());
        assert_eq!(cursor.index(), 0);

        cursor.advance();
        assert_eq!(cursor.current(&fields), Some("context"));
        assert!(cursor.retreat());
        assert_eq!(cursor.current(&fields), Some("mood"));

        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.current(&fields), None);
    }
}
