//! Parsing and validation for RSS 2.0 channel documents.
//!
//! This is deliberately a single-schema parser: one root element holding one
//! `<channel>`. Other syndication formats are out of scope.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvalidFeedError {
    #[error("malformed feed document: {0}")]
    Malformed(#[from] quick_xml::de::DeError),
    #[error("feed document has no channel")]
    MissingChannel,
    #[error("channel is missing required `{0}`")]
    MissingChannelField(&'static str),
}

/// A validated channel: mandatory metadata plus the items that survived
/// filtering, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<ChannelItem>,
}

/// An item that carried all four required fields. `pub_date` stays a raw
/// string here; interpreting it is the ingestion step's problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

// Deserialization shapes. quick-xml maps `@`-prefixed field names to XML
// attributes and everything else to child elements.

#[derive(Debug, Deserialize)]
struct RssDocument {
    #[serde(rename = "@version")]
    _version: Option<String>,
    channel: Option<RawChannel>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    // Absent, single, or repeated <item> elements all land in one Vec.
    #[serde(default, rename = "item")]
    items: Vec<RawItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RawItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

/// Parse and validate one RSS document.
///
/// The channel must carry a title, link, and description or the whole
/// document is rejected. Items missing any of title, link, description, or
/// pubDate are dropped without failing the document; an empty item list is
/// valid.
pub fn parse_channel(xml: &str) -> Result<Channel, InvalidFeedError> {
    let document: RssDocument = quick_xml::de::from_str(xml)?;
    let channel = document.channel.ok_or(InvalidFeedError::MissingChannel)?;

    let title = require(channel.title, "title")?;
    let link = require(channel.link, "link")?;
    let description = require(channel.description, "description")?;

    let items = channel.items.into_iter().filter_map(validate_item).collect();

    Ok(Channel {
        title,
        link,
        description,
        items,
    })
}

fn require(field: Option<String>, name: &'static str) -> Result<String, InvalidFeedError> {
    match field {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(InvalidFeedError::MissingChannelField(name)),
    }
}

fn validate_item(raw: RawItem) -> Option<ChannelItem> {
    let item = ChannelItem {
        title: raw.title?,
        link: raw.link?,
        description: raw.description?,
        pub_date: raw.pub_date?,
    };
    if item.title.is_empty()
        || item.link.is_empty()
        || item.description.is_empty()
        || item.pub_date.is_empty()
    {
        return None;
    }
    Some(item)
}
