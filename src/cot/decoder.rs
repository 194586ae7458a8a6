use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::types::CotView;

/// Decode a CoT XML document back into its plain structured view.
pub fn decode_cot(xml: &str) -> Result<CotView> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut view = CotView {
        uid: String::new(),
        cot_type: String::new(),
        time: Utc::now(),
        start: Utc::now(),
        stale: Utc::now(),
        latitude: 0.0,
        longitude: 0.0,
        ce: 0.0,
        hae: 0.0,
        le: 0.0,
        color_argb: 0,
        remarks: String::new(),
        callsign: String::new(),
        link_uid: String::new(),
    };
    let mut saw_event = false;
    let mut in_remarks = false;

    loop {
        match reader.read_event().context("malformed CoT XML")? {
            Event::Start(el) | Event::Empty(el) => match el.name().as_ref() {
                b"event" => {
                    saw_event = true;
                    read_event_attrs(&el, &mut view)?;
                }
                b"point" => read_point_attrs(&el, &mut view)?,
                b"link" => {
                    if let Some(uid) = attr(&el, b"uid")? {
                        view.link_uid = uid;
                    }
                }
                b"color" => {
                    if let Some(argb) = attr(&el, b"argb")? {
                        view.color_argb =
                            argb.parse().context("color argb is not an integer")?;
                    }
                }
                b"contact" => {
                    if let Some(callsign) = attr(&el, b"callsign")? {
                        view.callsign = callsign;
                    }
                }
                b"remarks" => in_remarks = true,
                _ => {}
            },
            Event::Text(text) if in_remarks => {
                view.remarks = text
                    .unescape()
                    .context("remarks text could not be unescaped")?
                    .into_owned();
            }
            Event::End(el) if el.name().as_ref() == b"remarks" => in_remarks = false,
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_event {
        bail!("document has no <event> root");
    }
    Ok(view)
}

fn attr(el: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attribute in el.attributes() {
        let attribute = attribute.context("malformed attribute")?;
        if attribute.key.as_ref() == name {
            let value = attribute
                .unescape_value()
                .context("attribute value could not be unescaped")?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(el: &BytesStart<'_>, name: &[u8]) -> Result<String> {
    attr(el, name)?.ok_or_else(|| {
        anyhow!(
            "missing required attribute '{}'",
            String::from_utf8_lossy(name)
        )
    })
}

fn parse_time(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("invalid {field} timestamp '{value}'"))
}

fn read_event_attrs(el: &BytesStart<'_>, view: &mut CotView) -> Result<()> {
    view.uid = required_attr(el, b"uid")?;
    view.cot_type = required_attr(el, b"type")?;
    view.time = parse_time(&required_attr(el, b"time")?, "time")?;
    view.start = parse_time(&required_attr(el, b"start")?, "start")?;
    view.stale = parse_time(&required_attr(el, b"stale")?, "stale")?;
    Ok(())
}

fn read_point_attrs(el: &BytesStart<'_>, view: &mut CotView) -> Result<()> {
    view.latitude = required_attr(el, b"lat")?
        .parse()
        .context("point lat is not a number")?;
    view.longitude = required_attr(el, b"lon")?
        .parse()
        .context("point lon is not a number")?;
    view.hae = required_attr(el, b"hae")?
        .parse()
        .context("point hae is not a number")?;
    view.ce = required_attr(el, b"ce")?
        .parse()
        .context("point ce is not a number")?;
    view.le = required_attr(el, b"le")?
        .parse()
        .context("point le is not a number")?;
    Ok(())
}
