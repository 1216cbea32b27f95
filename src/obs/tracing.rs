// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::ApiKind};

/// Span wrapper used around every outbound API operation.
#[derive(Clone, Debug)]
pub struct ApiSpan {
	span: Span,
}
impl ApiSpan {
	/// Creates a new span tagged with the provided API + operation.
	pub fn new(api: ApiKind, operation: &'static str) -> Self {
		Self { span: tracing::info_span!("driver_sync.call", api = api.as_str(), operation) }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
