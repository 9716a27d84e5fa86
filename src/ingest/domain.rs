//! Topical domain tags inferred from file names.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Droit,
    Finance,
    Sante,
    Coaching,
    Education,
    Cybersecurite,
    Tech,
    Administratif,
    Autre,
}

/// Keyword groups tested in order; the first group with a keyword contained
/// in the lowercased file name wins.
const KEYWORDS: &[(Domain, &[&str])] = &[
    (Domain::Droit, &["juridique", "assistant", "foad", "cours"]),
    (Domain::Finance, &["finance", "financial", "budget", "investissement"]),
    (
        Domain::Sante,
        &["sante", "psychosocial", "mental", "retablissement", "smps", "outil"],
    ),
    (Domain::Coaching, &["coaching", "debriefing", "cycle", "manual"]),
    (
        Domain::Education,
        &["pedagogique", "cpc", "conseiller", "maternelle", "programme"],
    ),
    (Domain::Cybersecurite, &["owasp", "anssi", "cybersecurite", "top10"]),
    (
        Domain::Tech,
        &["analyst", "data", "remote_work", "readme", "jax", "csv"],
    ),
    (Domain::Administratif, &["joe_", "journal", "officiel"]),
];

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Droit => "droit",
            Domain::Finance => "finance",
            Domain::Sante => "sante",
            Domain::Coaching => "coaching",
            Domain::Education => "education",
            Domain::Cybersecurite => "cybersecurite",
            Domain::Tech => "tech",
            Domain::Administratif => "administratif",
            Domain::Autre => "autre",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infer the topical domain of a document from its file name.
pub fn infer_domain(filename: &str) -> Domain {
    let name = filename.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| name.contains(w)))
        .map(|(domain, _)| *domain)
        .unwrap_or(Domain::Autre)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_domain_keywords() {
        assert_eq!(infer_domain("Guide_Juridique_2023.pdf"), Domain::Droit);
        assert_eq!(infer_domain("budget_previsionnel.docx"), Domain::Finance);
        assert_eq!(infer_domain("sante_mentale.txt"), Domain::Sante);
        assert_eq!(infer_domain("coaching-notes.md"), Domain::Coaching);
        assert_eq!(infer_domain("programme_maternelle.pdf"), Domain::Education);
        assert_eq!(infer_domain("OWASP_Top10.html"), Domain::Cybersecurite);
        assert_eq!(infer_domain("README.md"), Domain::Tech);
        assert_eq!(infer_domain("JOE_20240101.pdf"), Domain::Administratif);
    }

    #[test]
    fn test_infer_domain_fallback() {
        assert_eq!(infer_domain("plan_entrainement.pdf"), Domain::Autre);
        assert_eq!(infer_domain(""), Domain::Autre);
    }

    #[test]
    fn test_earlier_group_wins() {
        // "assistant" (droit) is tested before "data" (tech)
        assert_eq!(infer_domain("assistant_data.pdf"), Domain::Droit);
        // "outil" (sante) is tested before "manual" (coaching)
        assert_eq!(infer_domain("outil_manual.pdf"), Domain::Sante);
    }

    #[test]
    fn test_domain_serializes_lowercase() {
        let json = serde_json::to_value(Domain::Cybersecurite).unwrap();
        assert_eq!(json, "cybersecurite");
        assert_eq!(Domain::Cybersecurite.to_string(), "cybersecurite");
    }
}
