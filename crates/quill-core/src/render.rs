//! Turning raw model output into display-ready values.

use std::io::Cursor;

use base64::Engine as _;
use bytes::Bytes;
use serde::Serialize;

use crate::error::CoreError;
use crate::input::validate_threshold;
use crate::types::LabelScore;

pub const DEFAULT_THRESHOLD: f64 = 0.35;

/// Glyph shown next to the top emotion; unknown labels get none.
pub fn emotion_glyph(label: &str) -> &'static str {
    match label {
        "anger" => "😡",
        "disgust" => "🤢",
        "fear" => "😨",
        "joy" => "😊",
        "neutral" => "😐",
        "sadness" => "😢",
        "surprise" => "😲",
        _ => "",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub label: String,
    pub score: f64,
    /// Score with three decimals, as shown in the table.
    pub score_text: String,
    /// Bar width in percent of the full scale.
    pub bar_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmotionReport {
    pub top_label: String,
    pub glyph: &'static str,
    pub top_score: f64,
    /// Top score as a percentage with two decimals, e.g. `90.00%`.
    pub confidence_text: String,
    pub confident: bool,
    pub threshold: f64,
    /// All labels, highest score first.
    pub rows: Vec<ScoreRow>,
}

/// Build the emotion result view.
///
/// Labels are lower-cased; if two labels collide after that, the later score
/// replaces the earlier one in place. Rows are sorted by descending score,
/// keeping response order for ties.
pub fn render_emotion(scores: Vec<LabelScore>, threshold: f64) -> Result<EmotionReport, CoreError> {
    let threshold = validate_threshold(threshold)?;

    let mut merged: Vec<(String, f64)> = Vec::with_capacity(scores.len());
    for LabelScore { label, score } in scores {
        let label = label.to_lowercase();
        match merged.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = score,
            None => merged.push((label, score)),
        }
    }
    merged.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (top_label, top_score) = merged
        .first()
        .cloned()
        .ok_or_else(|| CoreError::MalformedResponse("classifier returned no labels".into()))?;

    let rows = merged
        .into_iter()
        .map(|(label, score)| ScoreRow {
            score_text: format!("{score:.3}"),
            bar_percent: (score * 100.0).clamp(0.0, 100.0),
            label,
            score,
        })
        .collect();

    Ok(EmotionReport {
        glyph: emotion_glyph(&top_label),
        confidence_text: format!("{:.2}%", top_score * 100.0),
        confident: top_score >= threshold,
        top_label,
        top_score,
        threshold,
        rows,
    })
}

/// Generated text is shown exactly as the model returned it.
pub fn render_text(generated: String) -> String {
    generated
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedImage {
    /// Lower-case format name, e.g. `png`.
    pub format: String,
    pub mime: &'static str,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub bytes: Bytes,
}

impl RenderedImage {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// `data:` URL suitable for an `<img src>`.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }
}

/// Inspect generated image bytes: the format is sniffed and the header
/// decoded for dimensions. The bytes themselves are passed through untouched.
pub fn render_image(bytes: Bytes) -> Result<RenderedImage, CoreError> {
    let reader = image::ImageReader::new(Cursor::new(bytes.as_ref()))
        .with_guessed_format()
        .map_err(|e| CoreError::MalformedResponse(format!("unreadable image: {e}")))?;
    let format = reader
        .format()
        .ok_or_else(|| CoreError::MalformedResponse("unrecognized image format".into()))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| CoreError::MalformedResponse(format!("undecodable image: {e}")))?;

    Ok(RenderedImage {
        format: format
            .extensions_str()
            .first()
            .copied()
            .unwrap_or("bin")
            .to_owned(),
        mime: format.to_mime_type(),
        width,
        height,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> Vec<LabelScore> {
        pairs
            .iter()
            .map(|(l, s)| LabelScore {
                label: l.to_string(),
                score: *s,
            })
            .collect()
    }

    #[test]
    fn joy_is_top_with_ninety_percent() {
        let report = render_emotion(
            scores(&[("sadness", 0.05), ("joy", 0.9), ("anger", 0.05)]),
            DEFAULT_THRESHOLD,
        )
        .unwrap();

        assert_eq!(report.top_label, "joy");
        assert_eq!(report.glyph, "😊");
        assert_eq!(report.confidence_text, "90.00%");
        assert!(report.confident);
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[0].label, "joy");
        assert!(report.rows.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(report.rows[0].score_text, "0.900");
    }

    #[test]
    fn threshold_is_inclusive() {
        let input = scores(&[("joy", 0.9), ("sadness", 0.05), ("anger", 0.05)]);
        assert!(render_emotion(input.clone(), 0.9).unwrap().confident);
        assert!(!render_emotion(input.clone(), 0.91).unwrap().confident);
        assert!(render_emotion(input, 0.0).unwrap().confident);
    }

    #[test]
    fn labels_are_lowercased_and_duplicates_collapse() {
        let report = render_emotion(
            scores(&[("JOY", 0.2), ("Fear", 0.3), ("joy", 0.5)]),
            DEFAULT_THRESHOLD,
        )
        .unwrap();
        let labels: Vec<_> = report.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["joy", "fear"]);
        assert_eq!(report.top_score, 0.5);
    }

    #[test]
    fn unknown_label_gets_blank_glyph() {
        let report = render_emotion(scores(&[("LABEL_3", 0.8)]), DEFAULT_THRESHOLD).unwrap();
        assert_eq!(report.top_label, "label_3");
        assert_eq!(report.glyph, "");
    }

    #[test]
    fn empty_scores_are_malformed() {
        assert!(matches!(
            render_emotion(Vec::new(), DEFAULT_THRESHOLD),
            Err(CoreError::MalformedResponse(_))
        ));
    }

    #[test]
    fn out_of_range_threshold_is_a_validation_error() {
        assert!(matches!(
            render_emotion(scores(&[("joy", 1.0)]), 1.5),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn generated_text_passes_through() {
        let out = render_text("He went to school yesterday.".to_owned());
        assert_eq!(out, "He went to school yesterday.");
    }

    #[test]
    fn png_dimensions_are_read() {
        let mut png = Vec::new();
        image::RgbImage::new(4, 3)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let rendered = render_image(Bytes::from(png.clone())).unwrap();
        assert_eq!((rendered.width, rendered.height), (4, 3));
        assert_eq!(rendered.format, "png");
        assert_eq!(rendered.mime, "image/png");
        assert!(rendered.data_url().starts_with("data:image/png;base64,"));
        assert_eq!(rendered.bytes.as_ref(), png.as_slice());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            render_image(Bytes::from_static(b"definitely not an image")),
            Err(CoreError::MalformedResponse(_))
        ));
    }
}
