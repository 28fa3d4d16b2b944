//! M3U playlist rendering for a resolved channel list

use crate::channels::Channel;

const PROVIDER: &str = "pluto";

/// How `channel-id` is derived for each entry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ChannelIdFormat {
    /// `pluto-<slug>`
    #[default]
    Slug,
    /// `pluto-<id>`
    Id,
    /// `<slug>`
    SlugOnly,
}

impl ChannelIdFormat {
    /// Parse the `channel_id_format` option; unknown values fall back to the default
    pub fn from_option(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "id" => ChannelIdFormat::Id,
            "slug_only" => ChannelIdFormat::SlugOnly,
            _ => ChannelIdFormat::Slug,
        }
    }

    fn channel_id(&self, channel: &Channel) -> String {
        match self {
            ChannelIdFormat::Slug => format!("{}-{}", PROVIDER, channel.slug),
            ChannelIdFormat::Id => format!("{}-{}", PROVIDER, channel.id),
            ChannelIdFormat::SlugOnly => channel.slug.clone(),
        }
    }
}

/// Strip quotes and control characters that would break an attribute value
fn attr_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect()
}

fn push_attr(line: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        line.push_str(&format!(" {}=\"{}\"", name, attr_value(value)));
    }
}

/// Render `channels` as an extended M3U playlist. Stream links point at
/// `<base_url>/<region>/watch/<id>`.
pub fn render_m3u(channels: &[Channel], region: &str, base_url: &str, format: ChannelIdFormat) -> String {
    let base_url = base_url.trim_end_matches('/');
    let mut m3u = String::from("#EXTM3U\r\n\r\n");

    let mut sorted: Vec<&Channel> = channels.iter().collect();
    sorted.sort_by_key(|c| c.number);

    for channel in sorted {
        let mut line = format!("#EXTINF:-1 channel-id=\"{}\"", attr_value(&format.channel_id(channel)));
        push_attr(&mut line, "tvg-id", Some(&channel.id));
        if channel.number != 0 {
            line.push_str(&format!(" tvg-chno=\"{}\"", channel.number));
        }
        push_attr(&mut line, "group-title", channel.category.as_deref());
        push_attr(&mut line, "tvg-logo", channel.logo.as_deref());
        push_attr(&mut line, "tvg-name", channel.tmsid.as_deref());
        push_attr(&mut line, "tvc-guide-title", Some(&channel.name));
        line.push(',');
        line.push_str(&channel.name);
        line.push('\n');

        m3u.push_str(&line);
        m3u.push_str(&format!("{}/{}/watch/{}\n\n", base_url, region, channel.id));
    }

    m3u
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str, number: i64) -> Channel {
        Channel {
            id: id.to_string(),
            name: format!("Channel {}", id),
            slug: format!("slug-{}", id),
            tmsid: None,
            category: Some("News".to_string()),
            number,
            logo: Some(format!("http://img/{}.png", id)),
        }
    }

    #[test]
    fn test_render_default_format() {
        let m3u = render_m3u(&[channel("a", 5)], "uk", "http://host:7777/", ChannelIdFormat::Slug);

        assert!(m3u.starts_with("#EXTM3U\r\n\r\n"));
        assert!(m3u.contains(
            "#EXTINF:-1 channel-id=\"pluto-slug-a\" tvg-id=\"a\" tvg-chno=\"5\" group-title=\"News\" \
             tvg-logo=\"http://img/a.png\" tvc-guide-title=\"Channel a\",Channel a\n"
        ));
        assert!(m3u.contains("http://host:7777/uk/watch/a\n"));
    }

    #[test]
    fn test_channel_id_formats() {
        let c = channel("abc", 1);
        assert!(render_m3u(&[c.clone()], "uk", "http://h", ChannelIdFormat::Id).contains("channel-id=\"pluto-abc\""));
        assert!(render_m3u(&[c], "uk", "http://h", ChannelIdFormat::SlugOnly).contains("channel-id=\"slug-abc\""));
        assert_eq!(ChannelIdFormat::from_option("ID"), ChannelIdFormat::Id);
        assert_eq!(ChannelIdFormat::from_option("slug_only"), ChannelIdFormat::SlugOnly);
        assert_eq!(ChannelIdFormat::from_option("whatever"), ChannelIdFormat::Slug);
    }

    #[test]
    fn test_entries_sorted_and_optional_attrs_skipped() {
        let mut b = channel("b", 2);
        b.category = None;
        b.logo = None;
        let m3u = render_m3u(&[channel("a", 9), b], "ca", "http://h", ChannelIdFormat::Slug);

        let first_b = m3u.find("tvg-id=\"b\"").unwrap();
        let first_a = m3u.find("tvg-id=\"a\"").unwrap();
        assert!(first_b < first_a);
        let b_line = m3u.lines().find(|l| l.contains("tvg-id=\"b\"")).unwrap();
        assert!(!b_line.contains("group-title"));
        assert!(!b_line.contains("tvg-logo"));
    }
}
