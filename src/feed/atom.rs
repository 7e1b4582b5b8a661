// src/feed/atom.rs
//! Namespace-aware Atom reader for the product feed.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use std::collections::BTreeMap;

use crate::feed::FeedEntry;
use crate::slug::extract_stable_id;

pub const ATOM_NS: &[u8] = b"http://www.w3.org/2005/Atom";
pub const PRODUCT_NS: &[u8] = b"http://www.finansportalen.no/feed/ns/1.0";

const SUPPLIER_ATTR: &str = "leverandor_tekst";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Title,
    Id,
    Attribute(String),
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    id: Option<String>,
    attributes: BTreeMap<String, String>,
}

impl EntryBuilder {
    fn set(&mut self, target: Target, text: &str) {
        let text = text.trim().to_string();
        match target {
            Target::Title => self.title = text,
            Target::Id => self.id = Some(text),
            Target::Attribute(name) => {
                self.attributes.insert(name, text);
            }
        }
    }

    fn finish(self) -> Option<FeedEntry> {
        let Some(id) = self.id else {
            tracing::warn!(target: "feed", title = %self.title, "entry without atom:id dropped");
            return None;
        };
        let stable_id = extract_stable_id(&id);
        if stable_id.is_empty() {
            tracing::warn!(target: "feed", id = %id, "entry id has no trailing segment, dropped");
            return None;
        }
        let supplier_label = self
            .attributes
            .get(SUPPLIER_ATTR)
            .cloned()
            .unwrap_or_default();
        Some(FeedEntry {
            title: self.title,
            supplier_label,
            stable_id,
            attributes: self.attributes,
        })
    }
}

fn in_ns(ns: &ResolveResult, uri: &[u8]) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(n)) if *n == uri)
}

fn child_target(ns: &ResolveResult, local: &[u8]) -> Option<Target> {
    if in_ns(ns, ATOM_NS) {
        match local {
            b"title" => Some(Target::Title),
            b"id" => Some(Target::Id),
            _ => None,
        }
    } else if in_ns(ns, PRODUCT_NS) {
        Some(Target::Attribute(String::from_utf8_lossy(local).into_owned()))
    } else {
        None
    }
}

/// Parse every `atom:entry` in document order.
pub fn parse_entries(xml: &str) -> Result<Vec<FeedEntry>> {
    let mut reader = NsReader::from_str(xml);

    let mut depth = 0usize;
    let mut entry_depth: Option<usize> = None;
    let mut builder = EntryBuilder::default();
    let mut capture: Option<(Target, usize)> = None;
    let mut text = String::new();
    let mut out = Vec::new();

    loop {
        let (ns, event) = reader.read_resolved_event().context("reading feed xml")?;
        match event {
            Event::Start(e) => {
                depth += 1;
                match entry_depth {
                    None => {
                        if in_ns(&ns, ATOM_NS) && e.local_name().as_ref() == b"entry" {
                            entry_depth = Some(depth);
                            builder = EntryBuilder::default();
                        }
                    }
                    Some(d) if depth == d + 1 && capture.is_none() => {
                        if let Some(target) = child_target(&ns, e.local_name().as_ref()) {
                            capture = Some((target, depth));
                            text.clear();
                        }
                    }
                    Some(_) => {}
                }
            }
            Event::Empty(e) => {
                if let Some(d) = entry_depth {
                    if depth == d && capture.is_none() {
                        if let Some(target) = child_target(&ns, e.local_name().as_ref()) {
                            builder.set(target, "");
                        }
                    }
                }
            }
            Event::Text(t) => {
                if capture.is_some() {
                    text.push_str(&t.unescape().context("unescaping feed text")?);
                }
            }
            Event::CData(c) => {
                if capture.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if matches!(&capture, Some((_, d)) if *d == depth) {
                    if let Some((target, _)) = capture.take() {
                        builder.set(target, &text);
                    }
                }
                if entry_depth == Some(depth) {
                    entry_depth = None;
                    if let Some(entry) = std::mem::take(&mut builder).finish() {
                        out.push(entry);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}
