use anyhow::{Result, bail};

/// Base URLs of the generated site. `home` is where index.html lives;
/// `root_home` is the host root (differs from `home` on GitHub Pages
/// project sites).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteUrls {
    pub home: String,
    pub root_home: String,
}

fn ensure_trailing_slash(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() || url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Accepts `example.com`, `example.com/` or `https://example.com[/path]`
/// and returns an origin ending in `/`.
pub fn normalize_site_domain(site_domain: &str) -> Result<String> {
    let raw = site_domain.trim();
    if raw.is_empty() {
        bail!("SITE_DOMAIN is empty");
    }

    if let Some((scheme, rest)) = raw.split_once("://") {
        let host = rest.split('/').next().unwrap_or("");
        if scheme.is_empty() || host.is_empty() {
            bail!("invalid SITE_DOMAIN URL: {site_domain:?}");
        }
        return Ok(ensure_trailing_slash(raw));
    }

    let bare = raw.trim_end_matches('/');
    if bare.contains('/') {
        bail!("SITE_DOMAIN must be a domain, not a path: {site_domain:?}");
    }
    Ok(format!("https://{bare}/"))
}

pub fn build_site_urls(
    site_domain: &str,
    gh_username: &str,
    project: &str,
    fallback_gh_username: Option<&str>,
) -> Result<SiteUrls> {
    if !site_domain.trim().is_empty() {
        let home = normalize_site_domain(site_domain)?;
        return Ok(SiteUrls {
            root_home: home.clone(),
            home,
        });
    }

    let username = match gh_username.trim() {
        "" => fallback_gh_username.unwrap_or("").trim(),
        explicit => explicit,
    };
    if username.is_empty() {
        bail!("missing SITE_DOMAIN or GH_USERNAME/PAGES_REPO");
    }
    let project = project.trim().trim_matches('/');
    Ok(SiteUrls {
        home: format!("https://{username}.github.io/{project}/"),
        root_home: format!("https://{username}.github.io/"),
    })
}

/// Relative href between two pages of `posts/`: `hello`, `posts/hello`
/// and `posts/hello.html` all become `hello.html`.
pub fn post_page_href(slug: &str) -> Result<String> {
    let raw = slug.trim();
    if raw.is_empty() {
        bail!("slug is empty");
    }
    if raw.split('/').any(|segment| segment == "..") {
        bail!("slug contains path traversal");
    }
    let filename = raw.rsplit('/').next().unwrap_or("");
    let filename = filename.strip_suffix(".html").unwrap_or(filename);
    if filename.is_empty() {
        bail!("slug did not contain a filename");
    }
    Ok(format!("{filename}.html"))
}

pub fn build_post_url(home: &str, slug: &str) -> Result<String> {
    let base = ensure_trailing_slash(home);
    if base.is_empty() {
        bail!("home is empty");
    }
    Ok(format!("{base}posts/{}", post_page_href(slug)?))
}
