use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Pad id of the XLM-RoBERTa vocabulary.
pub const PAD_ID: u32 = 1;

/// Tokenizes a batch into `[B, T]` id and mask tensors, truncating to
/// `max_len` and right-padding every row to the longest one in the batch.
pub fn tokenize_batch_on_device(
    tokenizer: &Tokenizer,
    texts: &[String],
    max_len: usize,
    device: &Device,
) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer
        .encode_batch(texts.to_vec(), true)
        .map_err(|e| anyhow!("Tokenization failed: {}", e))?;

    let mut rows: Vec<(Vec<u32>, Vec<u32>)> = encodings
        .iter()
        .map(|enc| {
            let mut ids = enc.get_ids().to_vec();
            let mut mask = enc.get_attention_mask().to_vec();
            ids.truncate(max_len);
            mask.truncate(max_len);
            (ids, mask)
        })
        .collect();
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    for (ids, mask) in &mut rows {
        let pad = width - ids.len();
        ids.extend(std::iter::repeat(PAD_ID).take(pad));
        mask.extend(std::iter::repeat(0).take(pad));
    }

    let batch = rows.len();
    let ids: Vec<u32> = rows.iter().flat_map(|(ids, _)| ids.iter().copied()).collect();
    let mask: Vec<u32> = rows.iter().flat_map(|(_, mask)| mask.iter().copied()).collect();
    let input_ids = Tensor::from_vec(ids, (batch, width), device)?;
    let attention_mask = Tensor::from_vec(mask, (batch, width), device)?;
    Ok((input_ids, attention_mask))
}
