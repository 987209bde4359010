//! Introduction message templates.
//!
//! The template is picked by the first edge's type and by whether the path
//! is direct or multi-hop. [`classify`] reads the template category back out
//! of a rendered message.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

use crate::graph::{EdgeType, Node};
use crate::paths::Path;

/// Template category of a rendered introduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntroTemplate {
    pub opener: EdgeType,
    pub hops: usize,
}

impl IntroTemplate {
    pub fn is_direct(&self) -> bool {
        self.hops == 1
    }
}

fn display_name(node: &Node) -> &str {
    if node.name.trim().is_empty() {
        &node.id
    } else {
        &node.name
    }
}

fn direct_phrase(edge_type: EdgeType) -> &'static str {
    match edge_type {
        EdgeType::CoInvestment => "have co-invested together",
        EdgeType::DirectInvestment => "are connected through a direct investment",
        EdgeType::FirmColleague => "work together at the same firm",
        EdgeType::BoardMember => "sit on a board together",
    }
}

fn opener_phrase(edge_type: EdgeType) -> &'static str {
    match edge_type {
        EdgeType::CoInvestment => "who has co-invested with",
        EdgeType::DirectInvestment => "who is linked through a direct investment with",
        EdgeType::FirmColleague => "a firm colleague of",
        EdgeType::BoardMember => "who shares a board seat with",
    }
}

pub fn template_for(path: &Path) -> Option<IntroTemplate> {
    path.first_edge_type().map(|opener| IntroTemplate {
        opener,
        hops: path.hops,
    })
}

/// Render the introduction message for a path. Pure and deterministic.
pub fn compose(path: &Path) -> String {
    let Some(template) = template_for(path) else {
        return String::new();
    };
    let (Some(source), Some(target)) = (path.nodes.first(), path.nodes.last()) else {
        return String::new();
    };
    let source = display_name(source);
    let target = display_name(target);
    let strength = (path.aggregate_strength * 100.0).round() as u32;

    if template.is_direct() {
        return format!(
            "{} and {} {}, so {} can reach out to {} directly. Connection strength: {}%.",
            source,
            target,
            direct_phrase(template.opener),
            source,
            target,
            strength
        );
    }

    let chain = path
        .nodes
        .iter()
        .map(display_name)
        .collect::<Vec<_>>()
        .join(" → ");
    let first_hop = display_name(&path.nodes[1]);
    let closing = if template.hops == 2 {
        format!("Ask {} for an introduction to {}.", first_hop, target)
    } else {
        format!(
            "Ask {} to pass the introduction along the chain to {}.",
            first_hop, target
        )
    };
    format!(
        "Warm introduction to {} ({} hops): {}. Start with {}, {} {}. {} Connection strength: {}%.",
        target,
        template.hops,
        chain,
        first_hop,
        opener_phrase(template.opener),
        source,
        closing,
        strength
    )
}

fn hops_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Warm introduction to .+? \((\d+) hops\): ").expect("Invalid regex pattern"))
}

/// Recover the template category from a rendered message, if it is one.
pub fn classify(text: &str) -> Option<IntroTemplate> {
    if let Some(caps) = hops_regex().captures(text) {
        let hops: usize = caps.get(1)?.as_str().parse().ok()?;
        let opener = EdgeType::ALL
            .into_iter()
            .find(|t| text.contains(&format!(", {} ", opener_phrase(*t))))?;
        return Some(IntroTemplate { opener, hops });
    }
    EdgeType::ALL
        .into_iter()
        .find(|t| text.contains(&format!(" {}, so ", direct_phrase(*t))))
        .map(|opener| IntroTemplate { opener, hops: 1 })
}
