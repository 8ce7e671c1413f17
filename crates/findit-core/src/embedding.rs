//! Embedding blob codec and text composition
//!
//! Embeddings persist as little-endian packed IEEE-754 f32, L2-normalized;
//! the paired `embedding_model` column names the producer.

use crate::error::{FindItError, Result};
use crate::model::Clip;

/// Pack an f32 vector into the storage blob form
pub fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Unpack a storage blob; length must be a multiple of four
pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(FindItError::InvalidData(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Scale a vector to unit L2 norm; zero vectors are left unchanged
pub fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for v in values.iter_mut() {
            *v /= norm;
        }
    }
}

/// Compose the text a clip is embedded from
///
/// Newline-joins the non-empty fields in order: scene, description,
/// transcript, tags (", "-joined), user_tags (", "-joined). An empty result
/// means the clip is unembeddable this round.
pub fn compose_embedding_text(clip: &Clip) -> String {
    let tags = clip.tags.join(", ");
    let user_tags = clip.user_tags.join(", ");
    let parts = [
        clip.scene.as_str(),
        clip.description.as_str(),
        clip.transcript.as_str(),
        tags.as_str(),
        user_tags.as_str(),
    ];
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_round_trip() {
        let values = vec![0.5_f32, -1.25, 3.0];
        let blob = encode_embedding(&values);
        assert_eq!(blob.len() % 4, 0);
        assert_eq!(decode_embedding(&blob).unwrap(), values);
    }

    #[test]
    fn test_decode_rejects_ragged_blob() {
        assert!(decode_embedding(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0_f32, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);

        let mut zero = vec![0.0_f32; 4];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 4]);
    }

    #[test]
    fn test_compose_text_order_and_skips() {
        let clip = Clip {
            scene: "harbor at dawn".to_string(),
            description: String::new(),
            transcript: "boats leaving".to_string(),
            tags: vec!["harbor".to_string(), "dawn".to_string()],
            user_tags: Vec::new(),
            ..Default::default()
        };
        assert_eq!(
            compose_embedding_text(&clip),
            "harbor at dawn\nboats leaving\nharbor, dawn"
        );
    }

    #[test]
    fn test_compose_text_empty_clip() {
        assert_eq!(compose_embedding_text(&Clip::default()), "");
    }
}
