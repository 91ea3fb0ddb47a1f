//! Service settings read from the environment (after `.env` is loaded).

use std::sync::Arc;

use anyhow::{Context, Result};
use doctalk_rag::{
    MongoConfig, MongoVectorStore, OpenAIAnswerGenerator, OpenAIEmbeddingProvider,
};

#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub mongo: MongoConfig,
    pub embedding_model: Option<String>,
    pub llm_model: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = non_empty("OPENAI_API_KEY").context("OPENAI_API_KEY is not set")?;
        let uri = non_empty("MONGODB_URI").context("MONGODB_URI is not set")?;

        let mut mongo = MongoConfig::new(uri);
        if let Some(database) = non_empty("DOCTALK_DATABASE") {
            mongo = mongo.with_database(database);
        }
        if let Some(collection) = non_empty("DOCTALK_COLLECTION") {
            mongo = mongo.with_collection(collection);
        }
        if let Some(index) = non_empty("DOCTALK_VECTOR_INDEX") {
            mongo = mongo.with_vector_index(index);
        }

        Ok(Self {
            openai_api_key,
            mongo,
            embedding_model: non_empty("DOCTALK_EMBEDDING_MODEL"),
            llm_model: non_empty("DOCTALK_LLM_MODEL"),
        })
    }

    pub fn embedding_provider(&self) -> Result<Arc<OpenAIEmbeddingProvider>> {
        let mut provider = OpenAIEmbeddingProvider::new(self.openai_api_key.clone())?;
        if let Some(model) = &self.embedding_model {
            provider = provider.with_model(model.clone());
        }
        Ok(Arc::new(provider))
    }

    pub fn generator(&self) -> Result<Arc<OpenAIAnswerGenerator>> {
        let mut generator = OpenAIAnswerGenerator::new(self.openai_api_key.clone())?;
        if let Some(model) = &self.llm_model {
            generator = generator.with_model(model.clone());
        }
        Ok(Arc::new(generator))
    }

    pub async fn vector_store(&self) -> Result<Arc<MongoVectorStore>> {
        let store = MongoVectorStore::connect(&self.mongo)
            .await
            .with_context(|| format!("failed to connect to MongoDB database '{}'", self.mongo.database))?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_credentials() {
        let err = Settings::from_lookup(lookup(&[("MONGODB_URI", "mongodb://localhost")]))
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let err = Settings::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test"), ("MONGODB_URI", " ")]))
            .unwrap_err();
        assert!(err.to_string().contains("MONGODB_URI"));
    }

    #[test]
    fn applies_overrides_over_defaults() {
        let settings = Settings::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MONGODB_URI", "mongodb://localhost"),
            ("DOCTALK_COLLECTION", "pages"),
            ("DOCTALK_LLM_MODEL", "gpt-4o"),
        ]))
        .unwrap();

        assert_eq!(settings.mongo.uri, "mongodb://localhost");
        assert_eq!(settings.mongo.database, "doctalk");
        assert_eq!(settings.mongo.collection, "pages");
        assert_eq!(settings.mongo.vector_index, "vector_index");
        assert_eq!(settings.llm_model.as_deref(), Some("gpt-4o"));
        assert!(settings.embedding_model.is_none());
    }
}
