use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::types::CotDocument;

pub(crate) const COT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub(crate) fn format_cot_time(time: &DateTime<Utc>) -> String {
    time.format(COT_TIME_FORMAT).to_string()
}

/// Render a CoT document as a UTF-8 XML string.
///
/// Succeeds for any valid document; the Result only covers the writer
/// plumbing itself.
pub fn encode_cot(doc: &CotDocument) -> Result<String> {
    let mut writer = Writer::new(Vec::new());

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("failed to write XML declaration")?;

    let mut event = BytesStart::new("event");
    event.push_attribute(("version", "2.0"));
    event.push_attribute(("uid", doc.uid.as_str()));
    event.push_attribute(("type", doc.cot_type));
    event.push_attribute(("time", format_cot_time(&doc.time).as_str()));
    event.push_attribute(("start", format_cot_time(&doc.start).as_str()));
    event.push_attribute(("stale", format_cot_time(&doc.stale).as_str()));
    writer
        .write_event(Event::Start(event))
        .context("failed to write event element")?;

    let mut point = BytesStart::new("point");
    point.push_attribute(("lat", format!("{:.7}", doc.latitude).as_str()));
    point.push_attribute(("lon", format!("{:.7}", doc.longitude).as_str()));
    point.push_attribute(("hae", format!("{:.1}", doc.hae).as_str()));
    point.push_attribute(("ce", format!("{:.1}", doc.ce).as_str()));
    point.push_attribute(("le", format!("{:.1}", doc.le).as_str()));
    writer
        .write_event(Event::Empty(point))
        .context("failed to write point element")?;

    writer
        .write_event(Event::Start(BytesStart::new("detail")))
        .context("failed to write detail element")?;

    let mut link = BytesStart::new("link");
    link.push_attribute(("relation", "p-p"));
    link.push_attribute(("type", "a-f-G-E-S"));
    link.push_attribute(("uid", doc.link_uid.as_str()));
    writer
        .write_event(Event::Empty(link))
        .context("failed to write link element")?;

    let mut color = BytesStart::new("color");
    color.push_attribute(("argb", doc.color_argb.to_string().as_str()));
    writer
        .write_event(Event::Empty(color))
        .context("failed to write color element")?;

    writer
        .write_event(Event::Start(BytesStart::new("remarks")))
        .context("failed to write remarks element")?;
    writer
        .write_event(Event::Text(BytesText::new(&doc.remarks)))
        .context("failed to write remarks text")?;
    writer
        .write_event(Event::End(BytesEnd::new("remarks")))
        .context("failed to close remarks element")?;

    let mut contact = BytesStart::new("contact");
    contact.push_attribute(("callsign", doc.callsign.as_str()));
    writer
        .write_event(Event::Empty(contact))
        .context("failed to write contact element")?;

    writer
        .write_event(Event::End(BytesEnd::new("detail")))
        .context("failed to close detail element")?;
    writer
        .write_event(Event::End(BytesEnd::new("event")))
        .context("failed to close event element")?;

    String::from_utf8(writer.into_inner()).context("encoded CoT was not valid UTF-8")
}
