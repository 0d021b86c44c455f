use std::fmt::{self, Display, Formatter};

/// How an attribute value was quoted in the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Quote {
    #[default]
    Double,
    Single,
    /// Unquoted value (`<img src=a.png>`).
    Bare,
}

impl Quote {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Double => "\"",
            Self::Single => "'",
            Self::Bare => "",
        }
    }

    /// Whether `value` can be written between these quotes as is.
    pub fn can_hold(&self, value: &str) -> bool {
        match self {
            Self::Double => !value.contains('"'),
            Self::Single => !value.contains('\''),
            Self::Bare => {
                !value.is_empty()
                    && !value
                        .chars()
                        .any(|c| c.is_ascii_whitespace() || matches!(c, '"' | '\'' | '=' | '<' | '>' | '`'))
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// `None` for boolean attributes (`<script async>`).
    pub value: Option<String>,
    pub quote: Quote,
}

impl Display for Attribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) if self.quote == Quote::Double && value.contains('"') => {
                write!(f, "{}=\"{}\"", self.name, value.replace('"', "&quot;"))
            },
            Some(value) => write!(f, "{}={q}{value}{q}", self.name, q = self.quote.as_str()),
            None => f.write_str(&self.name),
        }
    }
}

/// Ordered attribute table of a tag-start token.
///
/// Lookups are ASCII case-insensitive, like HTML attribute names. Source
/// order and quoting are kept so a host serializer can reproduce the tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<Attribute>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the first attribute called `name`. Boolean attributes read as `""`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
            .map(|attr| attr.value.as_deref().unwrap_or_default())
    }

    /// Overwrite the value of `name`, keeping its position and quote style, or
    /// append it (double-quoted) when missing.
    ///
    /// A value the old quote style cannot hold switches the attribute to
    /// double quotes; `"` is then written as `&quot;`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|attr| attr.name.eq_ignore_ascii_case(name)) {
            Some(attr) => {
                if attr.value.is_none() || !attr.quote.can_hold(&value) {
                    attr.quote = Quote::Double;
                }
                attr.value = Some(value);
            },
            None => self.0.push(Attribute {
                name: name.to_string(),
                value: Some(value),
                quote: Quote::Double,
            }),
        }
    }

    pub fn push(&mut self, attribute: Attribute) {
        self.0.push(attribute);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| Attribute {
                    name: name.into(),
                    value: Some(value.into()),
                    quote: Quote::Double,
                })
                .collect(),
        )
    }
}
