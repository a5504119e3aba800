use anyhow::{Context, Result};
use chrono::NaiveDate;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::models::Posting;

pub const DEFAULT_SITE_URL: &str = "https://es-calendar.example.com";
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

struct SitemapEntry {
    loc: String,
    priority: f32,
}

/// XML sitemap: the site root followed by one detail page per posting.
pub fn render_sitemap(
    site_url: &str,
    postings: &[Posting],
    last_modified: NaiveDate,
) -> Result<String> {
    let base = site_url.trim_end_matches('/');

    let mut entries = vec![SitemapEntry {
        loc: base.to_string(),
        priority: 1.0,
    }];
    entries.extend(postings.iter().map(|p| SitemapEntry {
        loc: format!("{}/p/{}", base, p.id),
        priority: 0.8,
    }));

    let lastmod = last_modified.format("%Y-%m-%d").to_string();
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NS));
    writer.write_event(Event::Start(urlset))?;

    for entry in &entries {
        writer.write_event(Event::Start(BytesStart::new("url")))?;
        write_text_element(&mut writer, "loc", &entry.loc)?;
        write_text_element(&mut writer, "lastmod", &lastmod)?;
        write_text_element(&mut writer, "changefreq", "daily")?;
        write_text_element(&mut writer, "priority", &format!("{:.1}", entry.priority))?;
        writer.write_event(Event::End(BytesEnd::new("url")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    String::from_utf8(writer.into_inner()).context("Sitemap is not valid UTF-8")
}

fn write_text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

pub fn render_robots(site_url: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\n\nSitemap: {}/sitemap.xml\n",
        site_url.trim_end_matches('/')
    )
}
