use serde::Serialize;
use std::collections::BTreeSet;

/// Crawlers named explicitly in the generated robots.txt.
pub const ALLOWED_CRAWLERS: &[&str] = &[
    "Googlebot",
    "Bingbot",
    "DuckDuckBot",
    "GPTBot",
    "ClaudeBot",
    "CCBot",
    "PerplexityBot",
    "facebookexternalhit",
];

pub fn render(sitemap_url: &str) -> String {
    let mut out = String::from("# robots.txt generated by devto-mirror\n\n");
    for agent in ALLOWED_CRAWLERS {
        out.push_str(&format!("User-agent: {agent}\nAllow: /\n\n"));
    }
    out.push_str("User-agent: *\nAllow: /\n\n");
    out.push_str(&format!("Sitemap: {sitemap_url}\n"));
    out
}

/// What a robots.txt grants, as far as `status` cares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RobotsSummary {
    pub allowed_agents: BTreeSet<String>,
    pub disallowed_agents: BTreeSet<String>,
    pub universal_allow: Vec<String>,
    pub universal_disallow: Vec<String>,
    pub sitemap: Option<String>,
}

impl RobotsSummary {
    pub fn allows_everyone(&self) -> bool {
        self.universal_allow.iter().any(|p| p == "/")
    }

    pub fn has_restrictions(&self) -> bool {
        !self.disallowed_agents.is_empty() || !self.universal_disallow.is_empty()
    }
}

fn directive<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = line.split_once(':')?;
    key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
}

/// Rules before the first `User-agent` and empty paths are ignored.
pub fn parse(content: &str) -> RobotsSummary {
    let mut summary = RobotsSummary::default();
    let mut agents: Vec<String> = Vec::new();
    let mut in_rules = false;

    for raw in content.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if let Some(agent) = directive(line, "user-agent") {
            // Consecutive User-agent lines share one rule group.
            if in_rules {
                agents.clear();
                in_rules = false;
            }
            if !agent.is_empty() {
                agents.push(agent.to_string());
            }
            continue;
        }
        if let Some(url) = directive(line, "sitemap") {
            if summary.sitemap.is_none() && !url.is_empty() {
                summary.sitemap = Some(url.to_string());
            }
            continue;
        }

        let (allow, path) = match (directive(line, "allow"), directive(line, "disallow")) {
            (Some(path), _) => (true, path),
            (_, Some(path)) => (false, path),
            _ => continue,
        };
        in_rules = true;
        if agents.is_empty() || path.is_empty() {
            continue;
        }
        for agent in &agents {
            match (agent.as_str(), allow) {
                ("*", true) => summary.universal_allow.push(path.to_string()),
                ("*", false) => summary.universal_disallow.push(path.to_string()),
                (_, true) => {
                    summary.allowed_agents.insert(agent.clone());
                }
                (_, false) => {
                    summary.disallowed_agents.insert(agent.clone());
                }
            }
        }
    }
    summary
}
