use std::collections::HashMap;

use crate::config::{Config, RoleProfile};

/// Where and how a question is answered once its role is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// The matched role, None when the default route applies
    pub role: Option<String>,
    pub namespace: String,
    pub chat_model: String,
    pub domain: Option<String>,
    pub score_threshold: Option<f32>,
}

/// Maps a request's role to an index namespace, chat model and filters.
#[derive(Debug, Clone)]
pub struct RoleRouter {
    default: Route,
    profiles: HashMap<String, RoleProfile>,
}

impl RoleRouter {
    pub fn new(config: &Config) -> Self {
        Self {
            default: Route {
                role: None,
                namespace: String::new(),
                chat_model: config.llm.chat_model.clone(),
                domain: None,
                score_threshold: config.retrieval.score_threshold,
            },
            profiles: config.roles.clone(),
        }
    }

    /// Resolve `role` (case-insensitive). Missing or unknown roles get the
    /// default route; each profile field overrides only its own default.
    pub fn resolve(&self, role: Option<&str>) -> Route {
        let Some(name) = role.map(|r| r.trim().to_lowercase()).filter(|r| !r.is_empty()) else {
            return self.default.clone();
        };

        let Some(profile) = self.profiles.get(&name) else {
            tracing::warn!("Unknown role '{name}', using default route");
            return self.default.clone();
        };

        Route {
            role: Some(name),
            namespace: profile
                .namespace
                .clone()
                .unwrap_or_else(|| self.default.namespace.clone()),
            chat_model: profile
                .chat_model
                .clone()
                .unwrap_or_else(|| self.default.chat_model.clone()),
            domain: profile.domain.clone().or_else(|| self.default.domain.clone()),
            score_threshold: profile.score_threshold.or(self.default.score_threshold),
        }
    }

    pub fn roles(&self) -> Vec<&str> {
        let mut roles: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles
    }
}
