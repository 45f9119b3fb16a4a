use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Board content rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    General,
    Sensitive,
    Questionable,
    Explicit,
}

impl Rating {
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Sensitive => "sensitive",
            Self::Questionable => "questionable",
            Self::Explicit => "explicit",
        }
    }
}

impl FromStr for Rating {
    type Err = String;

    /// Accepts either the board code or the full name, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "g" | "general" | "safe" => Ok(Self::General),
            "s" | "sensitive" => Ok(Self::Sensitive),
            "q" | "questionable" => Ok(Self::Questionable),
            "e" | "explicit" => Ok(Self::Explicit),
            other => Err(format!("unknown rating '{other}'")),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What gets written into an image: its tags, plus optional rating and score.
///
/// # Example
///
/// ```rust
/// use booru_xmp::annotation::{Annotation, Rating};
///
/// let mut a = Annotation::from_tag_string("1girl blue_hair solo");
/// a.rating = Some(Rating::General);
/// a.score = Some(42);
/// assert_eq!(a.to_text(), "1girl, blue_hair, solo, rating:general, score:42");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub tags: Vec<String>,
    pub rating: Option<Rating>,
    pub score: Option<i64>,
}

impl Annotation {
    /// Parse a space-separated board tag string.
    pub fn from_tag_string(tag_string: &str) -> Self {
        Self {
            tags: tag_string.split_whitespace().map(String::from).collect(),
            ..Self::default()
        }
    }

    /// Parse a comma-separated tag list, as found in `.txt` sidecars.
    pub fn from_tag_list(list: &str) -> Self {
        Self {
            tags: list
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            ..Self::default()
        }
    }

    /// Parse either form: comma-separated when the input has a comma,
    /// otherwise a space-separated board tag string.
    pub fn from_tags(tags: &str) -> Self {
        if tags.contains(',') {
            Self::from_tag_list(tags)
        } else {
            Self::from_tag_string(tags)
        }
    }

    /// Comma-joined tags followed by `rating:` and `score:` terms when set.
    pub fn to_text(&self) -> String {
        let mut terms: Vec<String> = self.tags.clone();
        if let Some(rating) = self.rating {
            terms.push(format!("rating:{rating}"));
        }
        if let Some(score) = self.score {
            terms.push(format!("score:{score}"));
        }
        terms.join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.rating.is_none() && self.score.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_parse_codes_and_names() {
        assert_eq!("g".parse::<Rating>().unwrap(), Rating::General);
        assert_eq!("Q".parse::<Rating>().unwrap(), Rating::Questionable);
        assert_eq!("explicit".parse::<Rating>().unwrap(), Rating::Explicit);
        assert_eq!("safe".parse::<Rating>().unwrap(), Rating::General);
        assert!("x".parse::<Rating>().is_err());
    }

    #[test]
    fn rating_display() {
        assert_eq!(Rating::Sensitive.to_string(), "sensitive");
    }

    #[test]
    fn tag_string_to_text() {
        let a = Annotation::from_tag_string("1girl  blue_hair\tsolo ");
        assert_eq!(a.tags, vec!["1girl", "blue_hair", "solo"]);
        assert_eq!(a.to_text(), "1girl, blue_hair, solo");
    }

    #[test]
    fn tag_list_parse() {
        let a = Annotation::from_tag_list("1girl, , solo,\nsmile");
        assert_eq!(a.tags, vec!["1girl", "solo", "smile"]);
    }

    #[test]
    fn from_tags_picks_separator() {
        assert_eq!(Annotation::from_tags("1girl solo").tags, vec!["1girl", "solo"]);
        assert_eq!(
            Annotation::from_tags("long hair, solo").tags,
            vec!["long hair", "solo"]
        );
    }

    #[test]
    fn rating_and_score_appended() {
        let a = Annotation {
            tags: vec!["solo".into()],
            rating: Some(Rating::Questionable),
            score: Some(-3),
        };
        assert_eq!(a.to_text(), "solo, rating:questionable, score:-3");
    }

    #[test]
    fn empty_annotation() {
        let a = Annotation::default();
        assert!(a.is_empty());
        assert_eq!(a.to_text(), "");
    }

    #[test]
    fn serde_rating_lowercase() {
        let json = serde_json::to_string(&Rating::Explicit).unwrap();
        assert_eq!(json, "\"explicit\"");
    }
}
