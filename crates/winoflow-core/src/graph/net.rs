//! Queue-driven execution of operator definitions over a named workspace.
//!
//! Every name carries the logical shape, domain and layout its producer will
//! leave behind, so an operator is shape-checked against its inputs when it
//! is issued. Nothing is submitted for an operator that fails those checks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use super::op::{OpKind, OperatorDef};
use crate::context::ExecutionContext;
use crate::device::pending;
use crate::layout::{self, BufferKind, StorageLayout};
use crate::ops::conv::direct::conv2d_direct;
use crate::ops::conv::winograd::{
    inverse_transform, transform_filter, transform_input, TileGeometry, TileGrid, KERNEL_SIZE,
};
use crate::ops::matmul::batched_tile_matmul;
use crate::precision::Element;
use crate::{Result, Shape, Tensor, TensorError};

/// A workspace entry.
#[derive(Debug, Clone)]
pub enum Blob<T> {
    /// Tensor in the net's storage precision
    Native(Tensor<T>),
    /// Transform-domain tensor, always `f32`
    Transform(Tensor<f32>),
}

type Workspace<T> = HashMap<String, Arc<Blob<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Domain {
    Native,
    Transform,
}

impl Domain {
    fn describe(&self) -> &'static str {
        match self {
            Domain::Native => "storage-precision",
            Domain::Transform => "transform-domain",
        }
    }
}

/// What a workspace name will hold once its producer has run.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Declared {
    domain: Domain,
    logical: Shape,
    tiled: Option<BufferKind>,
}

impl Declared {
    fn of<T: Element>(tensor: &Tensor<T>) -> Self {
        let tiled = match tensor.layout() {
            StorageLayout::Tiled { kind, .. } => Some(*kind),
            StorageLayout::Flat => None,
        };
        Self {
            domain: Domain::Native,
            logical: tensor.logical_shape().clone(),
            tiled,
        }
    }

    fn new(domain: Domain, dims: &[usize], tiled: Option<BufferKind>) -> Self {
        Self {
            domain,
            logical: Shape::from_slice(dims),
            tiled,
        }
    }

    fn dims(&self) -> &[usize] {
        self.logical.dims()
    }
}

/// Operators issued to an execution queue against a shared workspace.
///
/// `run_op` validates and enqueues. Results are read through
/// [`Net::output`], which waits for the operators issued before it. A failed
/// operator is reported by this net only; other work sharing the queue is
/// unaffected, and failures of that work never surface here.
#[derive(Debug)]
pub struct Net<T: Element> {
    ctx: ExecutionContext,
    workspace: Arc<Mutex<Workspace<T>>>,
    declared: HashMap<String, Declared>,
    /// First operator failure since the last `sync`
    failure: Arc<Mutex<Option<TensorError>>>,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Element> Net<T> {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx,
            workspace: Arc::new(Mutex::new(HashMap::new())),
            declared: HashMap::new(),
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Feed a host tensor, rounding it to the net's storage precision.
    pub fn add_input(&mut self, name: impl Into<String>, tensor: &Tensor<f32>) -> Result<()> {
        let name = name.into();
        if self.declared.contains_key(&name) {
            return Err(TensorError::invalid_argument(
                "add_input",
                format!("tensor '{name}' already exists"),
            ));
        }
        self.declared.insert(name.clone(), Declared::of(tensor));
        lock(&self.workspace).insert(name, Arc::new(Blob::Native(tensor.cast::<T>())));
        Ok(())
    }

    /// Shape-check `op` against the workspace and issue it.
    pub fn run_op(&mut self, op: &OperatorDef) -> Result<()> {
        op.check_arity()?;
        if op.dtype != T::DTYPE {
            return Err(TensorError::invalid_argument(
                &op.name,
                format!("operator declared as {} in a {} net", op.dtype, T::DTYPE),
            ));
        }
        let inputs = op
            .inputs
            .iter()
            .map(|name| {
                self.declared.get(name).ok_or_else(|| {
                    TensorError::invalid_argument(&op.name, format!("unknown input '{name}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let [output] = op.outputs.as_slice() else {
            return Err(TensorError::invalid_argument(
                &op.name,
                format!("{} has one output", op.kind),
            ));
        };
        if self.declared.contains_key(output) {
            return Err(TensorError::invalid_argument(
                &op.name,
                format!("output '{output}' already has a producer"),
            ));
        }
        let geometry = self.ctx.config().geometry;
        let produced = infer(op, &inputs, geometry)?;

        debug!(
            op = %op.name,
            kind = %op.kind,
            inputs = ?op.inputs,
            output = %produced.logical,
            "issuing operator"
        );
        self.declared.insert(output.clone(), produced);

        let workspace = Arc::clone(&self.workspace);
        let failure = Arc::clone(&self.failure);
        let output = output.clone();
        let op = op.clone();
        let label = op.name.clone();
        self.ctx.submit(
            &label,
            Box::new(move || -> Result<()> {
                let outcome = produce(&op, &workspace, geometry).map(|blob| {
                    lock(&workspace).insert(output, Arc::new(blob));
                });
                if let Err(err) = &outcome {
                    lock(&failure).get_or_insert_with(|| err.clone());
                }
                outcome
            }),
        );
        Ok(())
    }

    /// Issue a sequence of operators, stopping at the first rejected one.
    pub fn run(&mut self, ops: &[OperatorDef]) -> Result<()> {
        ops.iter().try_for_each(|op| self.run_op(op))
    }

    /// Wait for every operator issued so far and report the first one that
    /// failed since the last call.
    pub fn sync(&self) -> Result<()> {
        // The queue is in order, so the barrier runs after everything before it
        let (promise, barrier) = pending::<()>("net_sync");
        self.ctx.submit(
            "net_sync",
            Box::new(move || -> Result<()> {
                promise.fulfill(());
                Ok(())
            }),
        );
        barrier.wait()?;
        lock(&self.failure).take().map_or(Ok(()), Err)
    }

    /// Synchronize, then read `name` back as a flat `f32` tensor.
    pub fn output(&self, name: &str) -> Result<Tensor<f32>> {
        self.sync()?;
        if !self.declared.contains_key(name) {
            return Err(TensorError::invalid_argument(
                "net_output",
                format!("no tensor named '{name}'"),
            ));
        }
        let blob = lock(&self.workspace).get(name).cloned().ok_or_else(|| {
            TensorError::compute_error("net_output", format!("'{name}' was never produced"))
        })?;
        match blob.as_ref() {
            Blob::Native(tensor) => Ok(tensor.flat()?.cast::<f32>()),
            Blob::Transform(tensor) => Ok(tensor.flat()?.into_owned()),
        }
    }
}

fn operand<'a, V>(op: &OperatorDef, values: &'a [V], index: usize) -> Result<&'a V> {
    values.get(index).ok_or_else(|| {
        TensorError::invalid_argument(
            &op.name,
            format!("{} is missing operand {index}", op.kind),
        )
    })
}

fn expect<'a>(op: &OperatorDef, declared: &'a Declared, domain: Domain) -> Result<&'a [usize]> {
    if declared.domain == domain {
        Ok(declared.dims())
    } else {
        Err(TensorError::invalid_argument(
            &op.name,
            format!("{} expects a {} tensor", op.kind, domain.describe()),
        ))
    }
}

fn check_bias(op: &OperatorDef, bias: Option<&Declared>, out_channels: usize) -> Result<()> {
    if let Some(bias) = bias {
        expect(op, bias, Domain::Native)?;
        bias.logical.ensure_dims(&op.name, &[out_channels])?;
    }
    Ok(())
}

/// What `op` will produce from `inputs`, or why it cannot run.
fn infer(op: &OperatorDef, inputs: &[&Declared], geometry: TileGeometry) -> Result<Declared> {
    let first = *operand(op, inputs, 0)?;
    let mismatch = |expected: &str, got: &Declared| {
        TensorError::shape_mismatch(&op.name, expected, &format!("shape {}", got.logical))
    };

    match op.kind {
        OpKind::BufferToImage(kind) => {
            if let Some(current) = first.tiled {
                return Err(TensorError::shape_mismatch(
                    &op.name,
                    "flat tensor",
                    &format!("tensor already tiled as {current}"),
                ));
            }
            if first.logical.rank() != kind.logical_rank() {
                return Err(mismatch(
                    &format!("rank {} tensor for {kind}", kind.logical_rank()),
                    first,
                ));
            }
            Ok(Declared {
                tiled: Some(kind),
                ..first.clone()
            })
        }
        OpKind::ImageToBuffer(kind) => {
            if first.tiled != Some(kind) {
                let got = first
                    .tiled
                    .map_or_else(|| "flat tensor".to_string(), |k| format!("{k} image"));
                return Err(TensorError::shape_mismatch(
                    &op.name,
                    &format!("{kind} image"),
                    &got,
                ));
            }
            Ok(Declared {
                tiled: None,
                ..first.clone()
            })
        }
        OpKind::Conv2D { padding } => {
            let filter = *operand(op, inputs, 1)?;
            let input_dims = expect(op, first, Domain::Native)?;
            let filter_dims = expect(op, filter, Domain::Native)?;
            let &[batch, height, width, channels] = input_dims else {
                return Err(mismatch("rank 4 NHWC feature map", first));
            };
            let &[out_channels, in_channels, kernel, kernel_w] = filter_dims else {
                return Err(mismatch("rank 4 OIHW filter", filter));
            };
            if in_channels != channels || kernel != kernel_w {
                return Err(mismatch(
                    &format!("square filter over {channels} input channels"),
                    filter,
                ));
            }
            check_bias(op, inputs.get(2).copied(), out_channels)?;
            let (out_h, out_w) = padding.resolve(kernel)?.output_extent(height, width, kernel)?;
            Ok(Declared::new(
                Domain::Native,
                &[batch, out_h, out_w, out_channels],
                Some(BufferKind::InOutChannel),
            ))
        }
        OpKind::WinogradFilterTransform => {
            let &[out_channels, in_channels, KERNEL_SIZE, KERNEL_SIZE] =
                expect(op, first, Domain::Native)?
            else {
                return Err(mismatch("[out_channels, in_channels, 3, 3] filter", first));
            };
            Ok(Declared::new(
                Domain::Transform,
                &[geometry.coefficients(), out_channels, in_channels],
                Some(BufferKind::WinogradFilter),
            ))
        }
        OpKind::WinogradInputTransform { padding } => {
            let grid = TileGrid::plan(expect(op, first, Domain::Native)?, &padding, geometry)?;
            Ok(Declared::new(
                Domain::Transform,
                &[geometry.coefficients(), grid.channels, grid.total_tiles()],
                None,
            ))
        }
        OpKind::MatMul => {
            let rhs = *operand(op, inputs, 1)?;
            match (
                expect(op, first, Domain::Transform)?,
                expect(op, rhs, Domain::Transform)?,
            ) {
                (&[batches, rows, inner], &[rhs_batches, rhs_inner, cols])
                    if batches == rhs_batches && inner == rhs_inner =>
                {
                    Ok(Declared::new(Domain::Transform, &[batches, rows, cols], None))
                }
                _ => Err(mismatch(
                    &format!("[P, K, N] operand matching lhs {}", first.logical),
                    rhs,
                )),
            }
        }
        OpKind::WinogradInverseTransform {
            batch,
            height,
            width,
        } => {
            let &[_, out_channels, _] = expect(op, first, Domain::Transform)? else {
                return Err(mismatch("rank 3 transform-domain product", first));
            };
            let tiles = batch * geometry.tiles_for(height) * geometry.tiles_for(width);
            first
                .logical
                .ensure_dims(&op.name, &[geometry.coefficients(), out_channels, tiles])?;
            check_bias(op, inputs.get(1).copied(), out_channels)?;
            Ok(Declared::new(
                Domain::Native,
                &[batch, height, width, out_channels],
                Some(BufferKind::InOutChannel),
            ))
        }
    }
}

/// Gather the inputs of `op` from the workspace and run it.
fn produce<T: Element>(
    op: &OperatorDef,
    workspace: &Mutex<Workspace<T>>,
    geometry: TileGeometry,
) -> Result<Blob<T>> {
    let inputs: Vec<Arc<Blob<T>>> = {
        let ws = lock(workspace);
        op.inputs
            .iter()
            .map(|name| {
                ws.get(name).cloned().ok_or_else(|| {
                    TensorError::compute_error(
                        &op.name,
                        format!("input '{name}' was never produced"),
                    )
                })
            })
            .collect::<Result<_>>()?
    };
    let output = execute(op, &inputs, geometry);
    match &output {
        Ok(_) => trace!(op = %op.name, "operator finished"),
        Err(err) => warn!(op = %op.name, error = %err, "operator failed"),
    }
    output
}

fn native<'a, T>(op: &OperatorDef, blob: &'a Blob<T>) -> Result<&'a Tensor<T>> {
    match blob {
        Blob::Native(tensor) => Ok(tensor),
        Blob::Transform(_) => Err(TensorError::invalid_argument(
            &op.name,
            format!("{} expects a storage-precision tensor", op.kind),
        )),
    }
}

fn transform<'a, T>(op: &OperatorDef, blob: &'a Blob<T>) -> Result<&'a Tensor<f32>> {
    match blob {
        Blob::Transform(tensor) => Ok(tensor),
        Blob::Native(_) => Err(TensorError::invalid_argument(
            &op.name,
            format!("{} expects a transform-domain tensor", op.kind),
        )),
    }
}

fn execute<T: Element>(
    op: &OperatorDef,
    inputs: &[Arc<Blob<T>>],
    geometry: TileGeometry,
) -> Result<Blob<T>> {
    let first = operand(op, inputs, 0)?.as_ref();
    let second = inputs.get(1).map(|b| b.as_ref());

    let blob = match op.kind {
        OpKind::BufferToImage(kind) => match first {
            Blob::Native(tensor) => Blob::Native(layout::to_tiled(tensor, kind)?),
            Blob::Transform(tensor) => Blob::Transform(layout::to_tiled(tensor, kind)?),
        },
        OpKind::ImageToBuffer(kind) => match first {
            Blob::Native(tensor) => Blob::Native(layout::to_flat(tensor, kind)?),
            Blob::Transform(tensor) => Blob::Transform(layout::to_flat(tensor, kind)?),
        },
        OpKind::Conv2D { padding } => {
            let filter = native(op, operand(op, inputs, 1)?.as_ref())?;
            let bias = inputs.get(2).map(|b| native(op, b.as_ref())).transpose()?;
            let output = conv2d_direct(native(op, first)?, filter, bias, &padding)?;
            Blob::Native(layout::to_tiled(&output, BufferKind::InOutChannel)?)
        }
        OpKind::WinogradFilterTransform => {
            let u = transform_filter(native(op, first)?, geometry)?;
            Blob::Transform(layout::to_tiled(&u, BufferKind::WinogradFilter)?)
        }
        OpKind::WinogradInputTransform { padding } => {
            let (v, _) = transform_input(native(op, first)?, &padding, geometry)?;
            Blob::Transform(v)
        }
        OpKind::MatMul => {
            let rhs = transform(op, operand(op, inputs, 1)?.as_ref())?;
            Blob::Transform(batched_tile_matmul(transform(op, first)?, rhs)?)
        }
        OpKind::WinogradInverseTransform {
            batch,
            height,
            width,
        } => {
            let gemm = transform(op, first)?;
            let out_channels = gemm.logical_shape().dims().get(1).copied().unwrap_or(0);
            let bias = match second {
                Some(b) => native(op, b)?.clone(),
                None => Tensor::zeros(&[out_channels]),
            };
            let output = inverse_transform(gemm, &bias, batch, height, width, geometry)?;
            Blob::Native(layout::to_tiled(&output, BufferKind::InOutChannel)?)
        }
    };
    Ok(blob)
}
