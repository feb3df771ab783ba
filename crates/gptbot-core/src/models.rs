//! Completion models users may switch to with `gptModel`.

/// A model the bot knows how to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownModel {
    /// Model identifier sent to the completion API.
    pub id: String,
}

impl KnownModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Identifiers of the default model list.
///
/// Matching is by substring in list order, so longer identifiers that contain
/// a shorter one (`gpt-4o` contains `gpt-4`) must come first.
pub const DEFAULT_MODEL_IDS: &[&str] = &[
    "gpt-4o-mini",
    "gpt-4o",
    "gpt-4-turbo",
    "gpt-4",
    "gpt-3.5-turbo-16k",
    "gpt-3.5-turbo",
];

/// The default model list, in matching order.
pub fn default_models() -> Vec<KnownModel> {
    DEFAULT_MODEL_IDS.iter().map(|id| KnownModel::new(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longer_ids_precede_their_prefixes() {
        let models = default_models();
        for (i, earlier) in models.iter().enumerate() {
            for later in &models[i + 1..] {
                assert!(
                    !later.id.contains(&earlier.id),
                    "{} would shadow {}",
                    earlier.id,
                    later.id
                );
            }
        }
    }

    #[test]
    fn test_default_model_is_known() {
        assert!(DEFAULT_MODEL_IDS.contains(&crate::config::DEFAULT_MODEL));
    }
}
