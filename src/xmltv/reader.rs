//! Streaming XMLTV reader for published guide artifacts
//! Supports both plain XML and gzip-compressed (.xml.gz) files

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::document::{EpisodeNum, GuideChannel, GuideDocument, Programme};
use crate::error::{GuideError, Result};

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Channel,
    DisplayName,
    Programme,
    Title,
    SubTitle,
    Desc,
    Date,
    Category,
    EpisodeNum,
    SeriesId,
}

fn unescape_text(raw: &str) -> String {
    match quick_xml::escape::unescape(raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Get attribute value from XML element
fn get_attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = String::from_utf8_lossy(attr.value.as_ref());
            return Some(unescape_text(&raw));
        }
    }
    None
}

fn xml_err(position: impl std::fmt::Display, e: impl std::fmt::Display) -> GuideError {
    GuideError::Decode(format!("XML error at byte {}: {}", position, e))
}

/// Parse a guide from XMLTV text
pub fn parse(xml: &str) -> Result<GuideDocument> {
    parse_reader(xml.as_bytes())
}

/// Parse a guide from a reader. Unlike upstream feeds, our own artifacts are
/// expected to be well formed, so the first XML error aborts.
pub fn parse_reader<R: BufRead>(reader: R) -> Result<GuideDocument> {
    // No trim_text: entity references split text events and the spaces around them matter
    let mut xml_reader = Reader::from_reader(reader);

    let mut doc = GuideDocument::default();
    let mut buf = Vec::with_capacity(8192);

    let mut state = ParserState::Root;
    let mut current_channel: Option<GuideChannel> = None;
    let mut current_programme: Option<Programme> = None;
    let mut episode_system = String::new();
    let mut text_buf = String::new();

    loop {
        let position = xml_reader.buffer_position();
        let event = xml_reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_err(position, e))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let name = e.name();
                match name.as_ref() {
                    b"tv" => {
                        doc.generator = get_attribute(e, b"generator-info-name").unwrap_or_default();
                    }
                    b"channel" => {
                        state = ParserState::Channel;
                        current_channel = Some(GuideChannel {
                            id: get_attribute(e, b"id").unwrap_or_default(),
                            display_name: String::new(),
                            icon: None,
                        });
                    }
                    b"programme" => {
                        state = ParserState::Programme;
                        current_programme = Some(Programme {
                            channel: get_attribute(e, b"channel").unwrap_or_default(),
                            start: get_attribute(e, b"start").unwrap_or_default(),
                            stop: get_attribute(e, b"stop").unwrap_or_default(),
                            ..Programme::default()
                        });
                    }
                    b"display-name" if state == ParserState::Channel => {
                        state = ParserState::DisplayName;
                        text_buf.clear();
                    }
                    b"title" if state == ParserState::Programme => {
                        state = ParserState::Title;
                        text_buf.clear();
                    }
                    b"sub-title" if state == ParserState::Programme => {
                        state = ParserState::SubTitle;
                        text_buf.clear();
                    }
                    b"desc" if state == ParserState::Programme => {
                        state = ParserState::Desc;
                        text_buf.clear();
                    }
                    b"date" if state == ParserState::Programme => {
                        state = ParserState::Date;
                        text_buf.clear();
                    }
                    b"category" if state == ParserState::Programme => {
                        state = ParserState::Category;
                        text_buf.clear();
                    }
                    b"episode-num" if state == ParserState::Programme => {
                        state = ParserState::EpisodeNum;
                        episode_system = get_attribute(e, b"system").unwrap_or_default();
                        text_buf.clear();
                    }
                    b"series-id" if state == ParserState::Programme => {
                        state = ParserState::SeriesId;
                        text_buf.clear();
                    }
                    b"live" => {
                        if let Some(ref mut prog) = current_programme {
                            prog.live = true;
                        }
                    }
                    b"icon" => {
                        if let Some(src) = get_attribute(e, b"src") {
                            match state {
                                ParserState::Channel => {
                                    if let Some(ref mut chan) = current_channel {
                                        chan.icon = Some(src);
                                    }
                                }
                                ParserState::Programme => {
                                    if let Some(ref mut prog) = current_programme {
                                        prog.icon = Some(src);
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                }

                // Self-closing text elements carry no text; close them right away
                if matches!(event, Event::Empty(_)) {
                    state = close_element(state, &mut text_buf, &episode_system, &mut current_channel, &mut current_programme);
                }
            }
            Event::Text(ref e) => {
                if state != ParserState::Root && state != ParserState::Channel && state != ParserState::Programme {
                    text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(ref e) => {
                // Entity references arrive separately from the surrounding text
                text_buf.push('&');
                text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                text_buf.push(';');
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"channel" => {
                    if let Some(channel) = current_channel.take() {
                        doc.channels.push(channel);
                    }
                    state = ParserState::Root;
                }
                b"programme" => {
                    if let Some(programme) = current_programme.take() {
                        doc.programmes.push(programme);
                    }
                    state = ParserState::Root;
                }
                _ => {
                    state = close_element(state, &mut text_buf, &episode_system, &mut current_channel, &mut current_programme);
                }
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(doc)
}

/// Store the collected text of the element that just closed and return the parent state
fn close_element(
    state: ParserState,
    text_buf: &mut String,
    episode_system: &str,
    channel: &mut Option<GuideChannel>,
    programme: &mut Option<Programme>,
) -> ParserState {
    // Indentation never reaches text_buf, so the content is kept verbatim
    let text = unescape_text(text_buf);
    text_buf.clear();

    if state == ParserState::DisplayName {
        if let Some(chan) = channel {
            chan.display_name = text;
        }
        return ParserState::Channel;
    }

    let Some(prog) = programme else {
        return state;
    };
    match state {
        ParserState::Title => prog.title = text,
        ParserState::SubTitle => prog.sub_title = Some(text),
        ParserState::Desc => prog.description = Some(text),
        ParserState::Date => prog.date = Some(text),
        ParserState::Category => prog.categories.push(text),
        ParserState::EpisodeNum => prog.episode_nums.push(EpisodeNum::new(episode_system, text)),
        ParserState::SeriesId => prog.series_id = Some(text),
        other => return other,
    }
    ParserState::Programme
}

/// Parse a guide file - auto-detects gzip compression
pub fn parse_file(path: &Path) -> Result<GuideDocument> {
    let io_err = |e| GuideError::Decode(format!("{}: {}", path.display(), e));

    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);

    // Read first 2 bytes to check for gzip magic number (1f 8b)
    let mut magic = [0u8; 2];
    let sniffed = reader.read(&mut magic).map_err(io_err)?;
    reader.seek(SeekFrom::Start(0)).map_err(io_err)?;

    if sniffed == 2 && magic == [0x1f, 0x8b] {
        let decoder = GzDecoder::new(reader);
        parse_reader(BufReader::with_capacity(64 * 1024, decoder))
    } else {
        parse_reader(reader)
    }
}
