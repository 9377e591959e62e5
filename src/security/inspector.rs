//! Security inspection of inbound requests.
//!
//! Three independent checks run on every request, none short-circuiting:
//! payload size, injection signatures, user-agent classification. When more
//! than one fires, the most informative finding becomes the block reason and
//! the rest ride along for the audit trail.

use std::fmt;

use regex::{RegexSet, RegexSetBuilder};
use serde::Serialize;

use crate::config::SecurityConfig;
use crate::http::request::RequestContext;

/// Why a request was blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    PayloadTooLarge,
    InjectionSuspected,
    AutomatedAgent,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::PayloadTooLarge => "payload_too_large",
            BlockReason::InjectionSuspected => "injection_suspected",
            BlockReason::AutomatedAgent => "automated_agent",
        }
    }

    // Higher is more informative.
    fn rank(&self) -> u8 {
        match self {
            BlockReason::InjectionSuspected => 3,
            BlockReason::AutomatedAgent => 2,
            BlockReason::PayloadTooLarge => 1,
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One check that fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub reason: BlockReason,
    /// Pattern (or condition) that matched. Audit only.
    pub signature: Option<String>,
}

/// A terminal block decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityBlock {
    pub reason: BlockReason,
    pub signature: Option<String>,
    /// Every finding, including the reported one.
    pub findings: Vec<Finding>,
}

impl SecurityBlock {
    pub fn new(reason: BlockReason, signature: Option<String>) -> Self {
        let finding = Finding {
            reason,
            signature: signature.clone(),
        };
        Self {
            reason,
            signature,
            findings: vec![finding],
        }
    }

    fn from_findings(findings: Vec<Finding>) -> Option<Self> {
        let primary = findings.iter().max_by_key(|f| f.reason.rank())?.clone();
        Some(Self {
            reason: primary.reason,
            signature: primary.signature,
            findings,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityVerdict {
    Allow,
    Block(SecurityBlock),
}

/// Case-insensitive pattern list that reports which pattern matched.
#[derive(Debug, Clone)]
struct SignatureSet {
    patterns: Vec<String>,
    set: RegexSet,
}

impl SignatureSet {
    fn compile(patterns: &[String]) -> Result<Self, regex::Error> {
        let set = RegexSetBuilder::new(patterns).case_insensitive(true).build()?;
        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    fn first_match(&self, text: &str) -> Option<&str> {
        self.set
            .matches(text)
            .into_iter()
            .next()
            .map(|i| self.patterns[i].as_str())
    }
}

/// Compiled security policy.
#[derive(Debug, Clone)]
pub struct SecurityInspector {
    max_body_bytes: usize,
    injection: SignatureSet,
    automated: SignatureSet,
    hostile: SignatureSet,
    block_missing_user_agent: bool,
    development_mode: bool,
}

impl SecurityInspector {
    pub fn from_config(config: &SecurityConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            max_body_bytes: config.max_body_bytes,
            injection: SignatureSet::compile(&config.injection_signatures)?,
            automated: SignatureSet::compile(&config.automated_agent_patterns)?,
            hostile: SignatureSet::compile(&config.hostile_agent_patterns)?,
            block_missing_user_agent: config.block_missing_user_agent,
            development_mode: config.development_mode,
        })
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn inspect(&self, ctx: &RequestContext) -> SecurityVerdict {
        let findings: Vec<Finding> = [
            self.check_payload_size(ctx),
            self.check_injection(ctx),
            self.check_user_agent(ctx),
        ]
        .into_iter()
        .flatten()
        .collect();

        match SecurityBlock::from_findings(findings) {
            Some(block) => SecurityVerdict::Block(block),
            None => SecurityVerdict::Allow,
        }
    }

    fn check_payload_size(&self, ctx: &RequestContext) -> Option<Finding> {
        let body = ctx.body();
        (body.oversized || body.length > self.max_body_bytes).then(|| Finding {
            reason: BlockReason::PayloadTooLarge,
            signature: Some(format!("{} > {} bytes", body.length, self.max_body_bytes)),
        })
    }

    fn check_injection(&self, ctx: &RequestContext) -> Option<Finding> {
        let texts = ctx
            .query_pairs()
            .into_iter()
            .map(|(_, value)| value)
            .chain(body_texts(ctx));

        for text in texts {
            if let Some(pattern) = self.injection.first_match(&text) {
                return Some(Finding {
                    reason: BlockReason::InjectionSuspected,
                    signature: Some(pattern.to_string()),
                });
            }
        }
        None
    }

    fn check_user_agent(&self, ctx: &RequestContext) -> Option<Finding> {
        let agent = ctx.user_agent().map(str::trim).unwrap_or_default();

        if let Some(pattern) = self.hostile.first_match(agent) {
            return Some(Finding {
                reason: BlockReason::AutomatedAgent,
                signature: Some(pattern.to_string()),
            });
        }

        if self.development_mode {
            return None;
        }

        if agent.is_empty() {
            return self.block_missing_user_agent.then(|| Finding {
                reason: BlockReason::AutomatedAgent,
                signature: Some("<missing user-agent>".to_string()),
            });
        }

        self.automated.first_match(agent).map(|pattern| Finding {
            reason: BlockReason::AutomatedAgent,
            signature: Some(pattern.to_string()),
        })
    }
}

/// Textual leaves of the body: JSON strings, form values, or the raw text.
fn body_texts(ctx: &RequestContext) -> Vec<String> {
    let bytes = &ctx.body().bytes;
    if bytes.is_empty() {
        return Vec::new();
    }

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) {
        let mut out = Vec::new();
        collect_strings(&value, &mut out);
        return out;
    }

    let is_form = ctx
        .content_type()
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        return url::form_urlencoded::parse(bytes)
            .map(|(_, v)| v.into_owned())
            .collect();
    }

    vec![String::from_utf8_lossy(bytes).into_owned()]
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}
