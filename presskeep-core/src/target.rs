use thiserror::Error;
use url::Url;

use crate::consent::ConsentKind;

/// Fixed country suffix stripped from hosts when deriving short names.
const HOST_SUFFIX: &str = ".be";

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("target {input:?} matches more than one known website")]
    Ambiguous { input: String },
    #[error("cannot parse target url {input:?}: {source}")]
    InvalidUrl {
        input: String,
        source: url::ParseError,
    },
}

pub type TargetResult<T> = std::result::Result<T, TargetError>;

/// Canonical identity of a capture target. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    /// Browser-ready URL to navigate to.
    pub url: String,
    /// Short name used in messages and in the storage path.
    pub name: String,
    /// Consent-dialog strategy bound to this target.
    pub consent: ConsentKind,
}

struct KnownTarget {
    url: &'static str,
    consent: Option<ConsentKind>,
}

/// Belgian news front pages with a working consent strategy. Targets without
/// an explicit binding use the generic Didomi strategy.
const KNOWN_TARGETS: &[KnownTarget] = &[
    KnownTarget {
        url: "https://www.lesoir.be",
        consent: None,
    },
    KnownTarget {
        url: "https://www.lalibre.be",
        consent: None,
    },
    KnownTarget {
        url: "https://www.rtbf.be/info/",
        consent: Some(ConsentKind::Rtbf),
    },
    KnownTarget {
        url: "https://www.dhnet.be",
        consent: None,
    },
    KnownTarget {
        url: "https://www.rtl.be/info/",
        consent: None,
    },
    KnownTarget {
        url: "https://www.lecho.be",
        consent: None,
    },
    KnownTarget {
        url: "https://www.vrt.be",
        consent: Some(ConsentKind::Vrt),
    },
    KnownTarget {
        url: "https://www.standaard.be",
        consent: None,
    },
    KnownTarget {
        url: "https://www.tijd.be",
        consent: None,
    },
    KnownTarget {
        url: "https://www.nieuwsblad.be",
        consent: None,
    },
    KnownTarget {
        url: "https://www.hln.be",
        consent: Some(ConsentKind::DpgMedia),
    },
    KnownTarget {
        url: "https://www.demorgen.be",
        consent: Some(ConsentKind::DpgMedia),
    },
];

/// Canonical URLs of every known target, in table order.
pub fn known_target_urls() -> Vec<String> {
    KNOWN_TARGETS
        .iter()
        .map(|target| target.url.to_string())
        .collect()
}

/// Resolves a raw user-supplied string to a target identity.
///
/// Known targets match on any of their aliases; anything else becomes an
/// ad-hoc target with an `https://` prefix when the scheme is missing.
/// Pure lookup, no side effects.
pub fn resolve(raw: &str) -> TargetResult<TargetIdentity> {
    resolve_in(KNOWN_TARGETS, raw)
}

fn resolve_in(table: &[KnownTarget], raw: &str) -> TargetResult<TargetIdentity> {
    let mut matched: Vec<&KnownTarget> = Vec::new();
    for known in table {
        if aliases(known.url)?.iter().any(|alias| alias == raw) {
            matched.push(known);
        }
    }

    match matched.as_slice() {
        [] => {
            let url = if raw.starts_with("https://") || raw.starts_with("http://") {
                raw.to_string()
            } else {
                format!("https://{raw}")
            };
            Ok(TargetIdentity {
                name: short_name(&url)?,
                url,
                consent: ConsentKind::default(),
            })
        }
        [known] => Ok(TargetIdentity {
            url: known.url.to_string(),
            name: short_name(known.url)?,
            consent: known.consent.unwrap_or_default(),
        }),
        _ => Err(TargetError::Ambiguous {
            input: raw.to_string(),
        }),
    }
}

fn host_of(url: &str) -> TargetResult<String> {
    let parsed = Url::parse(url).map_err(|source| TargetError::InvalidUrl {
        input: url.to_string(),
        source,
    })?;
    parsed
        .host_str()
        .map(|host| host.to_string())
        .ok_or_else(|| TargetError::InvalidUrl {
            input: url.to_string(),
            source: url::ParseError::EmptyHost,
        })
}

/// Strings that select a known target: full URL, host, bare name, name plus
/// suffix (e.g. `https://www.vrt.be`, `www.vrt.be`, `vrt`, `vrt.be`).
fn aliases(url: &str) -> TargetResult<Vec<String>> {
    let host = host_of(url)?;
    let labels: Vec<&str> = host.split('.').collect();
    let mut aliases = vec![url.to_string(), host.clone()];
    if labels.len() >= 2 {
        aliases.push(labels[labels.len() - 2].to_string());
        aliases.push(labels[labels.len() - 2..].join("."));
    }
    Ok(aliases)
}

/// Host with the `www.` prefix and the country suffix stripped.
fn short_name(url: &str) -> TargetResult<String> {
    let host = host_of(url)?;
    let name = host.strip_prefix("www.").unwrap_or(&host);
    let name = name.strip_suffix(HOST_SUFFIX).unwrap_or(name);
    Ok(name.to_string())
}
