// 该文件是 Qiepian （切片识别） 项目的一部分。
// src/engine.rs - ONNX Runtime 推理会话池
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use ort::session::{Session, SessionOutputs};
use ort::value::TensorRef;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::frame::InputTensor;

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("模型加载错误 {path}: {source}")]
  ModelLoad {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("ONNX Runtime 错误: {0}")]
  Ort(#[from] ort::Error),
  #[error("模型没有名为 {0:?} 的输出")]
  MissingOutput(String),
  #[error("推理会话 {0} 的锁已损坏")]
  Poisoned(usize),
}

/// 从会话中取出的 f32 输出张量
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
  pub shape: Vec<i64>,
  pub data: Vec<f32>,
}

impl RawTensor {
  pub fn new(shape: Vec<i64>, data: Vec<f32>) -> Self {
    Self { shape, data }
  }
}

/// 同一计算图的多个会话，轮询分配给调用方
pub struct OrtEngine {
  sessions: Vec<Mutex<Session>>,
  next_idx: AtomicUsize,
  input_name: String,
}

impl OrtEngine {
  /// 读取序列化的计算图并创建 `sessions` 个会话（至少 1 个）
  pub fn load(
    model_path: impl AsRef<Path>,
    input_name: impl Into<String>,
    sessions: usize,
  ) -> Result<Self, EngineError> {
    let model_path = model_path.as_ref();
    info!("加载模型文件: {}", model_path.display());
    let model_data = std::fs::read(model_path).map_err(|source| EngineError::ModelLoad {
      path: model_path.to_path_buf(),
      source,
    })?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let count = sessions.max(1);
    let mut pool = Vec::with_capacity(count);
    for i in 0..count {
      let session = Session::builder()
        .and_then(|b| b.with_intra_threads(1))
        .and_then(|b| b.commit_from_memory(&model_data))
        .inspect_err(|e| error!("创建第 {} 个推理会话失败: {}", i, e))?;
      if i == 0 {
        for input in session.inputs.iter() {
          debug!("模型输入: {}", input.name);
        }
        for output in session.outputs.iter() {
          debug!("模型输出: {}", output.name);
        }
      }
      pool.push(Mutex::new(session));
    }
    info!("模型加载完成，会话数: {}", count);

    Ok(Self {
      sessions: pool,
      next_idx: AtomicUsize::new(0),
      input_name: input_name.into(),
    })
  }

  /// 以配置的输入名运行模型，按 `output_names` 的顺序返回输出
  pub fn run(
    &self,
    input: &InputTensor,
    output_names: &[&str],
  ) -> Result<Vec<RawTensor>, EngineError> {
    let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
    let mut session = self.sessions[idx]
      .lock()
      .map_err(|_| EngineError::Poisoned(idx))?;

    debug!("会话 {} 执行推理，输入形状 {:?}", idx, input.shape());
    let name = self.input_name.as_str();
    let outputs = match input {
      InputTensor::U8(array) => {
        let tensor = TensorRef::from_array_view(array.view())?;
        session.run(ort::inputs![name => tensor])?
      }
      InputTensor::F32(array) => {
        let tensor = TensorRef::from_array_view(array.view())?;
        session.run(ort::inputs![name => tensor])?
      }
    };

    output_names
      .iter()
      .map(|name| extract(&outputs, name))
      .collect()
  }
}

fn extract(outputs: &SessionOutputs, name: &str) -> Result<RawTensor, EngineError> {
  let value = outputs
    .get(name)
    .ok_or_else(|| EngineError::MissingOutput(name.to_string()))?;
  let (shape, data) = value.try_extract_tensor::<f32>()?;
  let shape = shape.to_vec();
  debug!("输出 {} 形状 {:?}", name, shape);
  Ok(RawTensor::new(shape, data.to_vec()))
}
