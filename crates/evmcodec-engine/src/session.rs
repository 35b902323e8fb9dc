//! Resumable decode sessions.
//!
//! A [`Decoding`] owns the word cache for one decode. Each [`Decoding::poll`]
//! runs the decode against what the cache holds. A pass that misses collects
//! every request it can already name; the poll hands them out one at a time
//! and the caller answers each with [`Decoding::resume`]. Only once the
//! whole batch is answered does the next poll run another pass, so an array
//! of n elements costs a few passes rather than n.

use std::collections::VecDeque;

use evmcodec_core::conversion::SELECTOR_SIZE;
use evmcodec_core::{
    AsyncDataSource, CodecError, DataPointer, DataSource, Decoded, DecoderRequest,
    MemberDefinition, Response, StopDecodingError, Type,
};

use crate::context::DecodeContext;
use crate::decode::{run, Target};
use crate::read::Interrupt;
use crate::state::EvmState;

/// The outcome of one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// The decode needs this before it can continue.
    Suspended(DecoderRequest),
    Done(Decoded),
}

#[derive(Debug)]
pub struct Decoding<'a> {
    target: Target,
    context: DecodeContext<'a>,
    state: EvmState,
    pending: VecDeque<DecoderRequest>,
    passes: usize,
}

impl<'a> Decoding<'a> {
    /// Decode a value of `ty` found at `pointer`.
    pub fn new(ty: Type, pointer: DataPointer, context: DecodeContext<'a>) -> Self {
        Self::with_target(Target::Value { ty, pointer }, context)
    }

    /// Decode a function's arguments from calldata, after the selector.
    pub fn arguments(params: Vec<MemberDefinition>, context: DecodeContext<'a>) -> Self {
        Self::with_target(
            Target::Arguments {
                params,
                base: SELECTOR_SIZE as u64,
            },
            context,
        )
    }

    fn with_target(target: Target, context: DecodeContext<'a>) -> Self {
        Self {
            target,
            context,
            state: EvmState::new(),
            pending: VecDeque::new(),
            passes: 0,
        }
    }

    /// Start from a pre-seeded (or previously used) cache.
    pub fn with_state(mut self, state: EvmState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &EvmState {
        &self.state
    }

    /// Hand the cache back, e.g. to reuse it for the next decode.
    pub fn into_state(self) -> EvmState {
        self.state
    }

    /// The request the next [`Decoding::resume`] answers.
    pub fn pending(&self) -> Option<&DecoderRequest> {
        self.pending.front()
    }

    /// How many times the decode has run against the cache.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Advance the decode as far as the cache allows. Polling again before
    /// resuming returns the same request.
    pub fn poll(&mut self) -> Result<Progress, StopDecodingError> {
        if let Some(request) = self.pending.front() {
            return Ok(Progress::Suspended(request.clone()));
        }
        let observer = self.context.observer;
        self.passes += 1;
        match run(&self.target, &self.context, &self.state) {
            Ok(decoded) => {
                observer.on_complete(&decoded);
                Ok(Progress::Done(decoded))
            }
            Err(Interrupt::Suspend(requests)) => {
                for request in &requests {
                    observer.on_request(request);
                }
                self.pending.extend(requests);
                self.poll()
            }
            Err(Interrupt::Stop(stop)) => {
                observer.on_error(&stop.error);
                Err(stop)
            }
            Err(Interrupt::Fail(error)) => {
                let decoded = Decoded::Error { error };
                observer.on_complete(&decoded);
                Ok(Progress::Done(decoded))
            }
        }
    }

    /// Answer the pending request. A response of the wrong kind (or the
    /// wrong length) is rejected and the request stays pending.
    pub fn resume(&mut self, response: Response) -> Result<(), CodecError> {
        let request = self.pending.pop_front().ok_or(CodecError::NothingPending)?;
        if let Err(e) = self.state.record(&request, response) {
            self.pending.push_front(request);
            return Err(e);
        }
        Ok(())
    }

    /// Drive the decode to completion, answering every request from `source`.
    pub fn decode_with<S: DataSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<Decoded, CodecError> {
        loop {
            match self.poll()? {
                Progress::Done(decoded) => return Ok(decoded),
                Progress::Suspended(request) => self.resume(source.answer(&request))?,
            }
        }
    }

    /// [`Decoding::decode_with`] over an asynchronous source.
    pub async fn decode_async<S: AsyncDataSource + ?Sized>(
        &mut self,
        source: &S,
    ) -> Result<Decoded, CodecError> {
        loop {
            match self.poll()? {
                Progress::Done(decoded) => return Ok(decoded),
                Progress::Suspended(request) => {
                    let response = source.answer(&request).await;
                    self.resume(response)?;
                }
            }
        }
    }
}
