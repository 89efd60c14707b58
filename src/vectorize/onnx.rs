//! ONNX Runtime implementations of the transformer and encoder model seams.

use std::{path::Path, sync::Arc};

use ndarray::{Array2, Axis, CowArray, Ix3};
use ort::{tensor::OrtOwnedTensor, Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
use tokenizers::Tokenizer;
use tracing::info;

use crate::{
    error::{Result, VectorizeError},
    vectorize::{
        encoder::SequenceEncoder,
        span::{SubwordModel, TokenStates},
    },
};

/// Maximum subword positions accepted by BERT-family models.
const MAX_POSITIONS: usize = 512;

fn model_err(err: impl ToString) -> VectorizeError {
    VectorizeError::Model(err.to_string())
}

fn environment() -> Result<Arc<Environment>> {
    Ok(Environment::builder()
        .with_name("adr-vectorizer")
        .build()
        .map_err(model_err)?
        .into_arc())
}

fn session(path: &Path) -> Result<Session> {
    let env = environment()?;
    SessionBuilder::new(&env)
        .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|b| b.with_intra_threads(1))
        .and_then(|b| b.with_model_from_file(path))
        .map_err(|e| VectorizeError::artifact(path, e))
}

/// Run `session` over one sequence of ids and return the first output as `[seq, hidden]`.
fn run_hidden(session: &Session, ids: &[i64]) -> Result<Array2<f32>> {
    let len = ids.len();
    let input_ids = CowArray::from(
        Array2::from_shape_vec((1, len), ids.to_vec()).map_err(model_err)?.into_dyn(),
    );
    let attention = CowArray::from(Array2::<i64>::ones((1, len)).into_dyn());
    let token_types = CowArray::from(Array2::<i64>::zeros((1, len)).into_dyn());

    let mut inputs = vec![
        Value::from_array(session.allocator(), &input_ids).map_err(model_err)?,
        Value::from_array(session.allocator(), &attention).map_err(model_err)?,
    ];
    if session.inputs.len() > 2 {
        inputs.push(Value::from_array(session.allocator(), &token_types).map_err(model_err)?);
    }
    inputs.truncate(session.inputs.len());

    let outputs = session.run(inputs).map_err(model_err)?;
    let first = outputs
        .first()
        .ok_or_else(|| model_err("model produced no outputs"))?;
    let tensor: OrtOwnedTensor<f32, _> = first.try_extract().map_err(model_err)?;
    let view = tensor.view();
    match view.ndim() {
        3 => {
            let hidden = view
                .clone()
                .into_dimensionality::<Ix3>()
                .map_err(model_err)?;
            Ok(hidden.index_axis(Axis(0), 0).to_owned())
        }
        2 => Ok(view
            .clone()
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(model_err)?
            .to_owned()),
        n => Err(model_err(format!("unexpected output rank {n}"))),
    }
}

/// Hugging Face tokenizer plus an exported BERT-family encoder.
///
/// `dir` must hold `tokenizer.json` and `model.onnx`.
pub struct OnnxSubwordModel {
    tokenizer: Tokenizer,
    session: Session,
}

impl OnnxSubwordModel {
    pub fn load(dir: &Path) -> Result<Self> {
        let tokenizer_path = dir.join("tokenizer.json");
        let model_path = dir.join("model.onnx");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| VectorizeError::artifact(&tokenizer_path, e))?;
        let session = session(&model_path)?;
        info!(model = %dir.display(), "loaded transformer");
        Ok(Self { tokenizer, session })
    }
}

impl SubwordModel for OnnxSubwordModel {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self.tokenizer.encode(text, false).map_err(model_err)?;
        Ok(encoding.get_tokens().to_vec())
    }

    fn token_states(&self, text: &str) -> Result<TokenStates> {
        let encoding = self.tokenizer.encode(text, true).map_err(model_err)?;
        let len = encoding.get_ids().len().min(MAX_POSITIONS);
        let ids: Vec<i64> = encoding.get_ids()[..len].iter().map(|&id| id as i64).collect();
        let hidden = run_hidden(&self.session, &ids)?;

        let special = encoding.get_special_tokens_mask();
        let keep: Vec<usize> = (0..len.min(hidden.nrows()))
            .filter(|&idx| special.get(idx).copied().unwrap_or(0) == 0)
            .collect();
        let tokens = keep
            .iter()
            .map(|&idx| encoding.get_tokens()[idx].clone())
            .collect();
        Ok(TokenStates {
            tokens,
            states: hidden.select(Axis(0), &keep),
        })
    }
}

/// Encoder network exported to ONNX, fed one padded index sequence at a time.
pub struct OnnxSequenceEncoder {
    session: Session,
}

impl OnnxSequenceEncoder {
    pub fn load(path: &Path) -> Result<Self> {
        let session = session(path)?;
        info!(model = %path.display(), "loaded onnx encoder");
        Ok(Self { session })
    }
}

impl SequenceEncoder for OnnxSequenceEncoder {
    fn encode(&self, sequence: &[usize]) -> Result<Vec<f32>> {
        let len = sequence.len();
        let input = CowArray::from(
            Array2::from_shape_vec((1, len), sequence.iter().map(|&i| i as f32).collect())
                .map_err(model_err)?
                .into_dyn(),
        );
        let value = Value::from_array(self.session.allocator(), &input).map_err(model_err)?;
        let outputs = self.session.run(vec![value]).map_err(model_err)?;
        let first = outputs
            .first()
            .ok_or_else(|| model_err("encoder produced no outputs"))?;
        let tensor: OrtOwnedTensor<f32, _> = first.try_extract().map_err(model_err)?;
        Ok(tensor.view().iter().copied().collect())
    }
}
