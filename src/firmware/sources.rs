//! Distribution Source Management
//!
//! Maps source locators to distribution identities and variants, and holds the
//! well-known repository URLs of the interpreter distributions this builder knows.

use std::collections::HashMap;

use crate::error::SourceError;

/// Archive suffix stripped from the last locator segment
const LOCATOR_SUFFIX: &str = ".git";

/// Distribution variant, selecting patch and frozen-module behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionVariant {
    /// Reference interpreter (https://github.com/micropython/micropython.git)
    MicroPython,
    /// Hardware-oriented fork (https://github.com/adafruit/circuitpython.git)
    CircuitPython,
    /// Any other tree, built with the reference behaviour
    Other,
}

impl DistributionVariant {
    /// Parse a variant from a distribution identity
    pub fn from_identity(identity: &str) -> Self {
        match identity.trim().to_lowercase().as_str() {
            "micropython" => DistributionVariant::MicroPython,
            "circuitpython" => DistributionVariant::CircuitPython,
            _ => DistributionVariant::Other,
        }
    }

    /// Get the canonical name for this variant
    pub fn canonical_name(&self) -> &str {
        match self {
            DistributionVariant::MicroPython => "micropython",
            DistributionVariant::CircuitPython => "circuitpython",
            DistributionVariant::Other => "other",
        }
    }

    /// Whether `-Werror` must be dropped from the port Makefile before building
    pub fn requires_relaxed_warnings(&self) -> bool {
        matches!(self, DistributionVariant::CircuitPython)
    }

    /// Whether the frozen-modules output is harvested before the main image build
    pub fn harvests_frozen_modules(&self) -> bool {
        matches!(self, DistributionVariant::CircuitPython)
    }
}

/// Derive the distribution identity from a source locator.
///
/// The identity is the final path segment with a trailing `.git` removed, so
/// `https://github.com/micropython/micropython.git`, `git@host:micropython.git`
/// and `/srv/mirror/micropython` all yield `micropython`.
pub fn distribution_identity(locator: &str) -> Result<String, SourceError> {
    let trimmed = locator.trim().trim_end_matches('/');
    let segment = trimmed
        .rsplit(|c| c == '/' || c == ':' || c == '\\')
        .next()
        .unwrap_or(trimmed);
    let identity = segment.strip_suffix(LOCATOR_SUFFIX).unwrap_or(segment);

    if identity.is_empty() || identity == "." || identity == ".." {
        return Err(SourceError::InvalidLocator(locator.to_string()));
    }
    Ok(identity.to_string())
}

/// A resolved distribution: locator plus derived identity and variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub locator: String,
    pub identity: String,
    pub variant: DistributionVariant,
}

impl Distribution {
    /// Resolve a distribution from its source locator
    pub fn from_locator(locator: &str) -> Result<Self, SourceError> {
        let identity = distribution_identity(locator)?;
        let variant = DistributionVariant::from_identity(&identity);
        Ok(Distribution {
            locator: locator.to_string(),
            identity,
            variant,
        })
    }
}

/// Known distribution repository URLs
pub struct DistributionSourceDB {
    sources: HashMap<String, String>,
}

impl DistributionSourceDB {
    /// Create a new source database with all known distributions
    pub fn new() -> Self {
        let mut sources = HashMap::new();

        sources.insert(
            "micropython".to_string(),
            "https://github.com/micropython/micropython.git".to_string(),
        );

        // Adafruit fork; its esp8266 port builds with -Werror and frozen modules
        sources.insert(
            "circuitpython".to_string(),
            "https://github.com/adafruit/circuitpython.git".to_string(),
        );

        DistributionSourceDB { sources }
    }

    /// Get the git URL for a distribution name
    pub fn get_source_url(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(|s| s.as_str())
    }

    /// Get all known distribution names, sorted
    pub fn available_distributions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(|k| k.as_str()).collect();
        names.sort();
        names
    }
}

impl Default for DistributionSourceDB {
    fn default() -> Self {
        Self::new()
    }
}
