//! Winograd convolution issued stage by stage to an execution queue.
//!
//! ```text
//!   filter ──► transform_filter ──┐
//!                                 ├─► batched_tile_matmul ─► inverse_transform ─► output
//!   input ───► transform_input ───┘
//! ```
//!
//! Shapes and padding are validated when the invocation is issued. Each stage
//! runs as one queued job and hands its output, or its error, to the next
//! through a [`Pending`] slot. A failed stage fails every stage downstream of
//! it in the same invocation and nothing else on the queue, so the caller
//! observes either the finished output or the error that stopped it.

use std::sync::Arc;

use tracing::debug;

use super::filter::transform_filter;
use super::geometry::{TileGeometry, KERNEL_SIZE};
use super::input::{transform_input, TileGrid};
use super::inverse::inverse_transform;
use crate::config::WinogradConfig;
use crate::context::ExecutionContext;
use crate::device::{pending, Pending};
use crate::ops::conv::padding::Padding;
use crate::ops::matmul::batched_tile_matmul;
use crate::precision::Element;
use crate::{Result, Tensor, TensorError};

const OP: &str = "winograd_conv2d";

/// Filter already moved to the transform domain, reusable across inputs.
#[derive(Debug, Clone)]
pub struct PreparedFilter {
    transformed: Arc<Tensor<f32>>,
    geometry: TileGeometry,
}

impl PreparedFilter {
    pub fn geometry(&self) -> TileGeometry {
        self.geometry
    }

    pub fn out_channels(&self) -> usize {
        self.transformed.dims()[1]
    }

    pub fn in_channels(&self) -> usize {
        self.transformed.dims()[2]
    }

    /// The `[P, out_channels, in_channels]` coefficients
    pub fn transformed(&self) -> &Tensor<f32> {
        &self.transformed
    }
}

/// 3×3, stride-1 convolution through the Winograd transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinogradConv2d {
    config: WinogradConfig,
}

impl WinogradConv2d {
    pub fn new(config: WinogradConfig) -> Self {
        Self { config }
    }

    pub fn geometry(&self) -> TileGeometry {
        self.config.geometry
    }

    /// Transform a filter once for use with [`Self::run_prepared`].
    pub fn prepare_filter<T: Element>(&self, filter: &Tensor<T>) -> Result<PreparedFilter> {
        Ok(PreparedFilter {
            transformed: Arc::new(transform_filter(filter, self.geometry())?),
            geometry: self.geometry(),
        })
    }

    /// Issue all four stages and return the slot the output will land in.
    pub fn enqueue<T: Element>(
        &self,
        ctx: &ExecutionContext,
        input: Tensor<T>,
        filter: Tensor<T>,
        bias: Tensor<T>,
        padding: Padding,
    ) -> Result<Pending<Tensor<T>>> {
        let filter_dims = filter.logical_shape().dims().to_vec();
        let &[out_channels, in_channels, KERNEL_SIZE, KERNEL_SIZE] = filter_dims.as_slice() else {
            return Err(TensorError::shape_mismatch(
                OP,
                "[out_channels, in_channels, 3, 3] filter",
                &format!("shape {filter_dims:?}"),
            ));
        };
        let grid = self.validate(&input, in_channels, out_channels, &bias, &padding)?;

        let geometry = self.geometry();
        let (filter_promise, transformed_filter) = pending("winograd_filter_transform");
        ctx.submit(
            "winograd_filter_transform",
            Box::new(move || {
                filter_promise.complete(transform_filter(&filter, geometry).map(Arc::new))
            }),
        );
        Ok(self.enqueue_tail(ctx, input, transformed_filter, bias, padding, grid))
    }

    /// Like [`Self::enqueue`], skipping the filter stage.
    pub fn enqueue_prepared<T: Element>(
        &self,
        ctx: &ExecutionContext,
        input: Tensor<T>,
        filter: &PreparedFilter,
        bias: Tensor<T>,
        padding: Padding,
    ) -> Result<Pending<Tensor<T>>> {
        if filter.geometry != self.geometry() {
            return Err(TensorError::invalid_argument(
                OP,
                format!(
                    "filter prepared for {} but convolution uses {}",
                    filter.geometry,
                    self.geometry()
                ),
            ));
        }
        let grid = self.validate(
            &input,
            filter.in_channels(),
            filter.out_channels(),
            &bias,
            &padding,
        )?;
        let transformed = Pending::ready("prepared_filter", Arc::clone(&filter.transformed));
        Ok(self.enqueue_tail(ctx, input, transformed, bias, padding, grid))
    }

    /// Issue and wait for this invocation's output.
    pub fn run<T: Element>(
        &self,
        ctx: &ExecutionContext,
        input: &Tensor<T>,
        filter: &Tensor<T>,
        bias: &Tensor<T>,
        padding: &Padding,
    ) -> Result<Tensor<T>> {
        self.enqueue(ctx, input.clone(), filter.clone(), bias.clone(), *padding)?
            .wait()
    }

    pub fn run_prepared<T: Element>(
        &self,
        ctx: &ExecutionContext,
        input: &Tensor<T>,
        filter: &PreparedFilter,
        bias: &Tensor<T>,
        padding: &Padding,
    ) -> Result<Tensor<T>> {
        self.enqueue_prepared(ctx, input.clone(), filter, bias.clone(), *padding)?
            .wait()
    }

    fn validate<T: Element>(
        &self,
        input: &Tensor<T>,
        in_channels: usize,
        out_channels: usize,
        bias: &Tensor<T>,
        padding: &Padding,
    ) -> Result<TileGrid> {
        let grid = TileGrid::plan(input.logical_shape().dims(), padding, self.geometry())?;
        if grid.channels != in_channels {
            return Err(TensorError::shape_mismatch(
                OP,
                &format!("input channels={in_channels}"),
                &format!("input channels={}", grid.channels),
            ));
        }
        bias.logical_shape().ensure_dims(OP, &[out_channels])?;
        Ok(grid)
    }

    fn enqueue_tail<T: Element>(
        &self,
        ctx: &ExecutionContext,
        input: Tensor<T>,
        transformed_filter: Pending<Arc<Tensor<f32>>>,
        bias: Tensor<T>,
        padding: Padding,
        grid: TileGrid,
    ) -> Pending<Tensor<T>> {
        let geometry = self.geometry();
        debug!(
            geometry = %geometry,
            padding = %padding,
            batch = grid.batch,
            output = ?(grid.output_height, grid.output_width),
            tiles = grid.total_tiles(),
            queue = ctx.queue().name(),
            "issuing winograd convolution"
        );

        let (input_promise, transformed_input) = pending("winograd_input_transform");
        ctx.submit(
            "winograd_input_transform",
            Box::new(move || {
                input_promise.complete(transform_input(&input, &padding, geometry).map(|(v, _)| v))
            }),
        );

        let (gemm_promise, gemm) = pending("batched_tile_matmul");
        ctx.submit(
            "batched_tile_matmul",
            Box::new(move || {
                let product = transformed_filter.wait().and_then(|u| {
                    let v = transformed_input.wait()?;
                    batched_tile_matmul(&u, &v)
                });
                gemm_promise.complete(product)
            }),
        );

        let (output_promise, output) = pending(OP);
        ctx.submit(
            "winograd_inverse_transform",
            Box::new(move || {
                let y = gemm.wait().and_then(|m| {
                    inverse_transform(
                        &m,
                        &bias,
                        grid.batch,
                        grid.output_height,
                        grid.output_width,
                        geometry,
                    )
                });
                output_promise.complete(y)
            }),
        );
        output
    }
}

/// Run a Winograd convolution with the geometry configured on `ctx`.
pub fn winograd_conv2d<T: Element>(
    ctx: &ExecutionContext,
    input: &Tensor<T>,
    filter: &Tensor<T>,
    bias: &Tensor<T>,
    padding: &Padding,
) -> Result<Tensor<T>> {
    WinogradConv2d::new(*ctx.config()).run(ctx, input, filter, bias, padding)
}
