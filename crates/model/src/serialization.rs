//! Drawing snapshots as JSON lines, one stroke per line in z-order.

use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::{Drawing, Stroke};

pub fn write_drawing_jsonl(writer: &mut dyn Write, drawing: &Drawing) -> Result<(), std::io::Error> {
    for stroke in drawing.strokes() {
        write_stroke_line(writer, stroke)?;
    }
    writer.flush()
}

pub fn write_stroke_line(writer: &mut dyn Write, stroke: &Stroke) -> Result<(), std::io::Error> {
    serde_json::to_writer(&mut *writer, stroke).map_err(|error| {
        std::io::Error::other(format!(
            "serialize stroke {} as JSON failed: {error}",
            stroke.id()
        ))
    })?;
    writer.write_all(b"\n")
}

pub fn read_drawing_jsonl(reader: &mut dyn BufRead) -> Result<Drawing, std::io::Error> {
    let mut strokes = Vec::new();
    let mut line_buffer = String::new();
    let mut line_number = 0usize;
    loop {
        line_buffer.clear();
        let bytes = reader.read_line(&mut line_buffer)?;
        if bytes == 0 {
            break;
        }
        line_number = line_number
            .checked_add(1)
            .unwrap_or_else(|| panic!("jsonl line number overflow"));
        if line_buffer.trim().is_empty() {
            continue;
        }
        let stroke = serde_json::from_str::<Stroke>(&line_buffer).map_err(|error| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("parse stroke JSON at line {line_number} failed: {error}"),
            )
        })?;
        strokes.push(Arc::new(stroke));
    }
    Ok(Drawing::from_strokes(strokes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rgba8, Sample, StrokeId, StrokeStyle};

    fn stroke_with_samples(offset: f64, is_eraser: bool) -> Stroke {
        let samples = (0..5)
            .map(|index| {
                Sample::capture(
                    (offset + index as f64 * 1.25, offset * 0.5 + 0.1 / 3.0),
                    0.173 * index as f32,
                    if index % 2 == 0 { Some(0.7) } else { None },
                    Some(1.2 + index as f32 * 0.01),
                    1_700_000_000.123 + index as f64 / 240.0,
                    2.5,
                )
            })
            .collect();
        Stroke::new(
            StrokeId::new_random(),
            samples,
            StrokeStyle {
                color: Rgba8::new(12, 200, 99, 180),
                base_width: 2.5,
                is_eraser,
            },
        )
    }

    #[test]
    fn jsonl_roundtrip_preserves_strokes_exactly() {
        let drawing = Drawing::from_strokes(vec![
            Arc::new(stroke_with_samples(3.0, false)),
            Arc::new(stroke_with_samples(-7.5, true)),
        ]);
        let mut bytes = Vec::new();
        write_drawing_jsonl(&mut bytes, &drawing).expect("write drawing");
        let mut reader = std::io::BufReader::new(bytes.as_slice());
        let parsed = read_drawing_jsonl(&mut reader).expect("read drawing");

        assert_eq!(parsed, drawing);
        assert_eq!(parsed.strokes()[1].id(), drawing.strokes()[1].id());
    }

    #[test]
    fn empty_drawing_roundtrips() {
        let mut bytes = Vec::new();
        write_drawing_jsonl(&mut bytes, &Drawing::new()).expect("write drawing");
        assert!(bytes.is_empty());
        let mut reader = std::io::BufReader::new(bytes.as_slice());
        assert!(read_drawing_jsonl(&mut reader).expect("read").is_empty());
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let mut bytes = Vec::new();
        write_stroke_line(&mut bytes, &stroke_with_samples(0.0, false)).expect("write stroke");
        bytes.extend_from_slice(b"\n{not json}\n");
        let mut reader = std::io::BufReader::new(bytes.as_slice());
        let error = read_drawing_jsonl(&mut reader).expect_err("malformed line should fail");
        assert_eq!(error.kind(), std::io::ErrorKind::InvalidData);
        assert!(error.to_string().contains("line 3"));
    }
}
