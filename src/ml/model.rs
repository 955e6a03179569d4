// ============================================================
// Layer 5 — Causal Language Model
// ============================================================
// A GPT-style decoder written with Burn:
//
//   input ids [B, C]
//     → token embedding + learned position embedding
//     → n_layer × DecoderBlock (pre-norm, causal self-attention,
//                               GELU feed-forward, residuals)
//     → final LayerNorm
//     → LM head → logits [B, C, vocab]
//
// The loss is plain cross-entropy of logits[:, i] against
// labels[:, i]. Labels are NOT shifted here: the batch builder
// already put the start token in front of the inputs, so
// position i of the input is exactly the context for label i.
//
// The config is read from a GPT-2 style `model_config.json`.
// Keys this model does not use (resid_pdrop, initializer_range,
// ...) are ignored.
//
// Reference: Burn Book §3 (Building Blocks)
//            Radford et al. (2019) GPT-2

use std::path::Path;

use anyhow::{bail, Context, Result};
use burn::{
    nn::{
        attention::{generate_autoregressive_mask, MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};
use serde::Deserialize;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct LmModelConfig {
    pub vocab_size: usize,
    /// Context size C: every window, input and label has this length
    pub n_ctx:      usize,
    pub n_embd:     usize,
    pub n_head:     usize,
    pub n_layer:    usize,
    #[config(default = 1e-5)]
    pub layer_norm_epsilon: f64,
    #[config(default = 0.1)]
    pub dropout: f64,
}

/// The on-disk shape of `model_config.json`.
///
/// Burn's Config derive requires every field when deserialising,
/// but GPT-2 style files often leave out the optional ones and
/// name dropout `resid_pdrop`, so files are read through here.
#[derive(Deserialize)]
struct ModelConfigFile {
    vocab_size: usize,
    n_ctx:      usize,
    n_embd:     usize,
    n_head:     usize,
    n_layer:    usize,
    #[serde(default = "default_layer_norm_epsilon")]
    layer_norm_epsilon: f64,
    #[serde(default = "default_dropout", alias = "resid_pdrop")]
    dropout: f64,
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

fn default_dropout() -> f64 {
    0.1
}

impl LmModelConfig {
    /// Read and sanity-check a model config file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        let cfg = Self::from_json(&text)
            .with_context(|| format!("Invalid model config '{}'", path.display()))?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Parse GPT-2 style config JSON; unknown keys are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ModelConfigFile = serde_json::from_str(json)?;
        Ok(Self::new(file.vocab_size, file.n_ctx, file.n_embd, file.n_head, file.n_layer)
            .with_layer_norm_epsilon(file.layer_norm_epsilon)
            .with_dropout(file.dropout))
    }

    pub fn check(&self) -> Result<()> {
        if self.n_ctx < 2 {
            bail!("n_ctx must be at least 2, got {}", self.n_ctx);
        }
        if self.n_head == 0 || self.n_embd % self.n_head != 0 {
            bail!(
                "n_embd ({}) must be divisible by n_head ({})",
                self.n_embd,
                self.n_head
            );
        }
        Ok(())
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> LmModel<B> {
        let wte = EmbeddingConfig::new(self.vocab_size, self.n_embd).init(device);
        let wpe = EmbeddingConfig::new(self.n_ctx, self.n_embd).init(device);
        let blocks: Vec<DecoderBlock<B>> = (0..self.n_layer)
            .map(|_| self.build_block(device))
            .collect();
        let ln_f = LayerNormConfig::new(self.n_embd)
            .with_epsilon(self.layer_norm_epsilon)
            .init(device);
        let lm_head = LinearConfig::new(self.n_embd, self.vocab_size)
            .with_bias(false)
            .init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        LmModel { wte, wpe, blocks, ln_f, lm_head, dropout, n_ctx: self.n_ctx }
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        let attn = MultiHeadAttentionConfig::new(self.n_embd, self.n_head)
            .with_dropout(self.dropout)
            .init(device);
        let ln_1 = LayerNormConfig::new(self.n_embd)
            .with_epsilon(self.layer_norm_epsilon)
            .init(device);
        let ln_2 = LayerNormConfig::new(self.n_embd)
            .with_epsilon(self.layer_norm_epsilon)
            .init(device);
        let mlp_fc   = LinearConfig::new(self.n_embd, 4 * self.n_embd).init(device);
        let mlp_proj = LinearConfig::new(4 * self.n_embd, self.n_embd).init(device);
        let dropout  = DropoutConfig::new(self.dropout).init();
        DecoderBlock { attn, ln_1, ln_2, mlp_fc, mlp_proj, dropout }
    }
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub attn:     MultiHeadAttention<B>,
    pub ln_1:     LayerNorm<B>,
    pub ln_2:     LayerNorm<B>,
    pub mlp_fc:   Linear<B>,
    pub mlp_proj: Linear<B>,
    pub dropout:  Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Tensor<B, 3, Bool>) -> Tensor<B, 3> {
        let h = self.ln_1.forward(x.clone());
        let attn_out = self.attn.forward(MhaInput::self_attn(h).mask_attn(mask)).context;
        let x = x + self.dropout.forward(attn_out);

        let h = self.ln_2.forward(x.clone());
        let mlp_out = self.mlp_proj.forward(
            burn::tensor::activation::gelu(self.mlp_fc.forward(h))
        );
        x + self.dropout.forward(mlp_out)
    }
}

#[derive(Module, Debug)]
pub struct LmModel<B: Backend> {
    pub wte:     Embedding<B>,
    pub wpe:     Embedding<B>,
    pub blocks:  Vec<DecoderBlock<B>>,
    pub ln_f:    LayerNorm<B>,
    pub lm_head: Linear<B>,
    pub dropout: Dropout,
    pub n_ctx:   usize,
}

impl<B: Backend> LmModel<B> {
    /// input_ids: [batch, seq_len] → logits: [batch, seq_len, vocab]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let tok_emb = self.wte.forward(input_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.wpe.forward(positions);

        // Position i may only attend to positions 0..=i
        let mask = generate_autoregressive_mask::<B>(batch_size, seq_len, &device);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for block in &self.blocks {
            x = block.forward(x, mask.clone());
        }
        self.lm_head.forward(self.ln_f.forward(x))
    }

    /// Mean cross-entropy over every position of every row.
    pub fn forward_loss(
        &self,
        input_ids: Tensor<B, 2, Int>,
        labels:    Tensor<B, 2, Int>,
    ) -> Tensor<B, 1> {
        let [batch_size, seq_len] = labels.dims();
        let logits = self.forward(input_ids);
        let [_, _, vocab] = logits.dims();

        let ce = CrossEntropyLossConfig::new().init(&logits.device());
        ce.forward(
            logits.reshape([batch_size * seq_len, vocab]),
            labels.reshape([batch_size * seq_len]),
        )
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use std::io::Write;
    use tempfile::NamedTempFile;

    type TestBackend = NdArray;

    fn tiny() -> LmModelConfig {
        LmModelConfig::new(50, 8, 16, 2, 1)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = tiny().init::<TestBackend>(&device);
        let ids = Tensor::<TestBackend, 2, Int>::zeros([3, 8], &device);
        assert_eq!(model.forward(ids).dims(), [3, 8, 50]);
    }

    #[test]
    fn test_loss_is_finite_and_positive() {
        let device = Default::default();
        let model = tiny().init::<TestBackend>(&device);
        let inputs = Tensor::<TestBackend, 1, Int>::from_ints([1, 2, 3, 4, 5, 6, 7, 8].as_slice(), &device)
            .reshape([1, 8]);
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([2, 3, 4, 5, 6, 7, 8, 9].as_slice(), &device)
            .reshape([1, 8]);

        let loss: f64 = model.forward_loss(inputs, labels).into_scalar().elem::<f64>();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_gpt2_style_config_file_loads() {
        let json = r#"{
            "initializer_range": 0.02,
            "layer_norm_epsilon": 1e-05,
            "n_ctx": 64,
            "n_embd": 32,
            "n_head": 4,
            "n_layer": 2,
            "n_positions": 64,
            "vocab_size": 21128
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file.flush().unwrap();

        let cfg = LmModelConfig::load_file(file.path()).unwrap();
        assert_eq!(cfg.n_ctx, 64);
        assert_eq!(cfg.vocab_size, 21128);
        assert_eq!(cfg.dropout, 0.1);
    }

    #[test]
    fn test_resid_pdrop_is_read_as_dropout() {
        let json = r#"{
            "attn_pdrop": 0.1,
            "embd_pdrop": 0.1,
            "resid_pdrop": 0.2,
            "n_ctx": 1024,
            "n_embd": 768,
            "n_head": 12,
            "n_layer": 10,
            "vocab_size": 21128
        }"#;
        let cfg = LmModelConfig::from_json(json).unwrap();
        assert_eq!(cfg.dropout, 0.2);
        assert_eq!(cfg.layer_norm_epsilon, 1e-5);
        assert_eq!(cfg.n_layer, 10);
    }

    #[test]
    fn test_saved_config_reads_back() {
        let cfg = LmModelConfig::new(50, 8, 16, 2, 1).with_dropout(0.0);
        let file = NamedTempFile::new().unwrap();
        cfg.save(file.path()).unwrap();

        let back = LmModelConfig::load_file(file.path()).unwrap();
        assert_eq!(back.dropout, 0.0);
        assert_eq!(back.n_embd, 16);
    }

    #[test]
    fn test_missing_required_key_is_an_error() {
        assert!(LmModelConfig::from_json(r#"{ "n_ctx": 8 }"#).is_err());
    }

    #[test]
    fn test_heads_must_divide_embedding() {
        assert!(LmModelConfig::new(50, 8, 10, 3, 1).check().is_err());
        assert!(tiny().check().is_ok());
    }
}
