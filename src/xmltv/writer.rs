//! XMLTV serialization

use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::document::{GuideChannel, GuideDocument, Programme};
use crate::error::{GuideError, Result};

const DOCTYPE: &str = r#"tv SYSTEM "xmltv.dtd""#;

fn xml_err<E: std::fmt::Display>(e: E) -> GuideError {
    GuideError::Render(e.to_string())
}

fn start<W: Write>(w: &mut Writer<W>, tag: BytesStart) -> Result<()> {
    w.write_event(Event::Start(tag)).map_err(xml_err)
}

fn end<W: Write>(w: &mut Writer<W>, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name))).map_err(xml_err)
}

fn empty<W: Write>(w: &mut Writer<W>, tag: BytesStart) -> Result<()> {
    w.write_event(Event::Empty(tag)).map_err(xml_err)
}

/// `<name attrs...>text</name>`
fn text_element<W: Write>(w: &mut Writer<W>, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<()> {
    let mut tag = BytesStart::new(name);
    for attr in attrs {
        tag.push_attribute(*attr);
    }
    start(w, tag)?;
    w.write_event(Event::Text(BytesText::new(text))).map_err(xml_err)?;
    end(w, name)
}

fn write_channel<W: Write>(w: &mut Writer<W>, channel: &GuideChannel) -> Result<()> {
    let mut tag = BytesStart::new("channel");
    tag.push_attribute(("id", channel.id.as_str()));
    start(w, tag)?;
    text_element(w, "display-name", &[], &channel.display_name)?;
    if let Some(icon) = &channel.icon {
        let mut tag = BytesStart::new("icon");
        tag.push_attribute(("src", icon.as_str()));
        empty(w, tag)?;
    }
    end(w, "channel")
}

// Children follow the xmltv.dtd order; live and series-id are extensions and go last
fn write_programme<W: Write>(w: &mut Writer<W>, p: &Programme) -> Result<()> {
    let mut tag = BytesStart::new("programme");
    tag.push_attribute(("start", p.start.as_str()));
    tag.push_attribute(("stop", p.stop.as_str()));
    tag.push_attribute(("channel", p.channel.as_str()));
    start(w, tag)?;

    text_element(w, "title", &[], &p.title)?;
    if let Some(sub_title) = &p.sub_title {
        text_element(w, "sub-title", &[], sub_title)?;
    }
    if let Some(desc) = &p.description {
        text_element(w, "desc", &[], desc)?;
    }
    if let Some(date) = &p.date {
        text_element(w, "date", &[], date)?;
    }
    for category in &p.categories {
        text_element(w, "category", &[], category)?;
    }
    if let Some(icon) = &p.icon {
        let mut tag = BytesStart::new("icon");
        tag.push_attribute(("src", icon.as_str()));
        empty(w, tag)?;
    }
    for num in &p.episode_nums {
        text_element(w, "episode-num", &[("system", num.system.as_str())], &num.value)?;
    }
    if p.live {
        empty(w, BytesStart::new("live"))?;
    }
    if let Some(series_id) = &p.series_id {
        text_element(w, "series-id", &[("system", "pluto")], series_id)?;
    }

    end(w, "programme")
}

/// Serialize `document` with XML declaration and the xmltv.dtd doctype
pub fn to_xml(document: &GuideDocument) -> Result<Vec<u8>> {
    write_xml(document, Vec::new())
}

/// Serialize `document` into `sink`, handing the sink back when done
pub fn write_xml<W: Write>(document: &GuideDocument, sink: W) -> Result<W> {
    let mut w = Writer::new_with_indent(sink, b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_err)?;
    w.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))
        .map_err(xml_err)?;

    let mut root = BytesStart::new("tv");
    root.push_attribute(("generator-info-name", document.generator.as_str()));
    start(&mut w, root)?;
    for channel in &document.channels {
        write_channel(&mut w, channel)?;
    }
    for programme in &document.programmes {
        write_programme(&mut w, programme)?;
    }
    end(&mut w, "tv")?;

    let mut sink = w.into_inner();
    sink.write_all(b"\n").map_err(xml_err)?;
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmltv::document::{EpisodeNum, SYSTEM_ONSCREEN};

    fn sample() -> GuideDocument {
        let mut doc = GuideDocument::new();
        doc.channels.push(GuideChannel {
            id: "c1".into(),
            display_name: "News & Weather".into(),
            icon: Some("http://img/c1.png?a=1&b=2".into()),
        });
        doc.programmes.push(Programme {
            channel: "c1".into(),
            start: "20240115120000 +0000".into(),
            stop: "20240115123000 +0000".into(),
            title: "Morning <Report>".into(),
            description: Some("The \"big\" story".into()),
            categories: vec!["News".into(), "Series".into()],
            episode_nums: vec![EpisodeNum::new(SYSTEM_ONSCREEN, "S02E03")],
            live: true,
            series_id: Some("s1".into()),
            ..Programme::default()
        });
        doc
    }

    #[test]
    fn test_header_and_doctype() {
        let xml = String::from_utf8(to_xml(&sample()).unwrap()).unwrap();
        let mut lines = xml.lines();
        assert_eq!(lines.next(), Some(r#"<?xml version="1.0" encoding="utf-8"?>"#));
        assert_eq!(lines.next(), Some(r#"<!DOCTYPE tv SYSTEM "xmltv.dtd">"#));
        assert!(xml.contains(r#"<tv generator-info-name="pluto_guide">"#));
    }

    #[test]
    fn test_text_and_attributes_escaped() {
        let xml = String::from_utf8(to_xml(&sample()).unwrap()).unwrap();
        assert!(xml.contains("<display-name>News &amp; Weather</display-name>"));
        assert!(xml.contains(r#"<icon src="http://img/c1.png?a=1&amp;b=2"/>"#));
        assert!(xml.contains("<title>Morning &lt;Report&gt;</title>"));
        assert!(xml.contains(r#"<episode-num system="onscreen">S02E03</episode-num>"#));
        assert!(xml.contains("<live/>"));
        assert!(xml.contains(r#"<series-id system="pluto">s1</series-id>"#));
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_is_render_error() {
        match write_xml(&sample(), BrokenSink) {
            Err(GuideError::Render(msg)) => assert!(msg.contains("disk full"), "{}", msg),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("write to a broken sink succeeded"),
        }
    }

    #[test]
    fn test_programme_attributes() {
        let xml = String::from_utf8(to_xml(&sample()).unwrap()).unwrap();
        assert!(xml.contains(
            r#"<programme start="20240115120000 +0000" stop="20240115123000 +0000" channel="c1">"#
        ));
    }
}
