//! XMLTV guide assembly and publication
//!
//! Builds a guide document from a region's EPG batch, serializes it with the
//! xmltv.dtd doctype and publishes it as `epg-<region>.xml` plus a gzip copy.

mod builder;
mod document;
mod publish;
pub mod reader;
mod writer;


pub use builder::{build_document, xmltv_time, GuideBuilder, Published};
pub use document::{
    EpisodeNum, GuideChannel, GuideDocument, Programme, SYSTEM_AIR_DATE, SYSTEM_ONSCREEN, SYSTEM_PLUTO,
};
pub use publish::{ArtifactPaths, Publisher};
pub use writer::to_xml;
