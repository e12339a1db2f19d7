//! JSON deserialization that reports where in the document it failed.
use serde::de::DeserializeOwned;
use thiserror::Error;

/// A deserialization failure with the JSON path of the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at {path} → {message}")]
pub struct PathError {
    /// `kinds.money.imports[0]`-style path; `top level` for the document itself.
    pub path: String,
    pub message: String,
}

pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = match err.path().to_string() {
            root if root == "." => "top level".to_string(),
            path => path,
        };
        PathError { path, message: err.into_inner().to_string() }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Outer {
        #[allow(dead_code)]
        inner: Inner,
    }

    #[derive(Debug, Deserialize)]
    struct Inner {
        #[allow(dead_code)]
        count: u32,
    }

    #[test]
    fn error_names_the_failing_path() {
        let err = from_str_with_path::<Outer>(r#"{ "inner": { "count": "three" } }"#).unwrap_err();
        assert_eq!(err.path, "inner.count");
        assert!(err.to_string().starts_with("at inner.count → "), "{err}");
    }

    #[test]
    fn syntax_errors_point_at_the_top_level() {
        let err = from_str_with_path::<Outer>("{ not json").unwrap_err();
        assert!(err.to_string().starts_with("at top level → "), "{err}");
    }
}
