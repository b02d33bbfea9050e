pub mod add_post;
pub mod backup;
pub mod render;
pub mod reset;
pub mod status;
pub mod sync;

use anyhow::Result;
use serde::Serialize;

use crate::mirror::config::{MirrorConfig, load_config, validate_config};
use crate::mirror::paths::{MirrorPaths, resolve_paths};
use crate::mirror::site::SiteContext;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }
}

/// Paths plus validated config, with CLI flags applied on top of the
/// environment before validation.
pub fn prepare(apply: impl FnOnce(&mut MirrorConfig)) -> Result<(MirrorPaths, MirrorConfig)> {
    let paths = resolve_paths()?;
    let mut cfg = load_config(&paths.root)?;
    apply(&mut cfg);
    validate_config(&cfg)?;
    Ok((paths, cfg))
}

pub fn site_context(cfg: &MirrorConfig) -> Result<SiteContext> {
    Ok(SiteContext {
        username: cfg.source.username.clone(),
        urls: cfg.site_urls()?,
    })
}
