//! The frame processor: connection admission, request parsing and
//! response construction.
//!
//! One call to [`FrameProcessor::poll`] performs a complete cycle:
//!
//! 1. Admit a pending client if the current one is absent or gone,
//!    otherwise accept the newcomer and close it immediately.
//! 2. Drain the bytes the current client has sent, up to capacity.
//! 3. Validate the frame and dispatch it by function code, invoking the
//!    matching handler.
//! 4. Finalize the MBAP prefix and transmit the response.
//!
//! Invalid frames are dropped without a response and `poll` returns `0`.
//! Nothing here blocks and nothing allocates once the processor is built.

use crate::buffer::{RequestData, ResponseData};
use crate::frame::{
    be_u16, FunctionCode, MbapHeader, BYTE_COUNT_OFFSET, COIL_ON, DEFAULT_CAPACITY,
    FUNCTION_OFFSET, MBAP_LEN, MIN_REQUEST_LEN, PAYLOAD_OFFSET, REQUEST_DATA_OFFSET,
    RESPONSE_DATA_OFFSET, UNIT_ID_OFFSET, WRITE_RESPONSE_LEN,
};
use crate::handler::{HandlerKind, Handlers};
use crate::stats::{DropReason, PollStats};
use crate::transport::{Connection, Transport};
use tracing::{debug, info, trace, warn};

/// Modbus TCP slave frame processor.
///
/// `N` is the capacity of both the request and the response buffer and is
/// fixed at build time.
pub struct FrameProcessor<T: Transport, const N: usize = DEFAULT_CAPACITY> {
    unit_id: u8,
    strict_mbap: bool,
    transport: T,
    client: Option<T::Conn>,
    input: [u8; N],
    output: [u8; N],
    handlers: Handlers,
    stats: PollStats,
}

impl<T: Transport> FrameProcessor<T> {
    /// Create a processor answering to `unit_id` on `transport`, with
    /// buffers of [`DEFAULT_CAPACITY`] bytes.
    pub fn new(unit_id: u8, transport: T) -> Self {
        Self::with_capacity(unit_id, transport)
    }
}

impl<T: Transport, const N: usize> FrameProcessor<T, N> {
    const CAPACITY_CHECK: () = assert!(
        N >= MIN_REQUEST_LEN,
        "buffer capacity must hold the smallest request"
    );

    /// Create a processor whose buffers hold `N` bytes.
    ///
    /// ```ignore
    /// let processor = FrameProcessor::<_, 64>::with_capacity(1, transport);
    /// ```
    pub fn with_capacity(unit_id: u8, transport: T) -> Self {
        let () = Self::CAPACITY_CHECK;
        Self {
            unit_id,
            strict_mbap: false,
            transport,
            client: None,
            input: [0; N],
            output: [0; N],
            handlers: Handlers::new(),
            stats: PollStats::default(),
        }
    }

    /// Enable or disable the strict MBAP check.
    ///
    /// When enabled, frames with a non-zero protocol id or an MBAP length
    /// that differs from the number of bytes following the prefix are
    /// dropped.
    #[must_use]
    pub fn with_strict_mbap(mut self, strict: bool) -> Self {
        self.strict_mbap = strict;
        self
    }

    /// Configured unit identifier.
    #[must_use]
    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Buffer capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The current client connection, if any.
    pub fn client(&self) -> Option<&T::Conn> {
        self.client.as_ref()
    }

    /// Check whether a live client is attached.
    #[must_use]
    pub fn has_live_client(&self) -> bool {
        self.client.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Close and forget the current client.
    pub fn disconnect(&mut self) {
        if let Some(mut client) = self.client.take() {
            client.close();
            info!("Client connection closed");
        }
    }

    /// Install the Read Coils / Read Discrete Inputs handler.
    pub fn on_read_coils<F>(&mut self, handler: F)
    where
        F: FnMut(FunctionCode, u16, u16, &mut ResponseData<'_>) + 'static,
    {
        self.handlers.read_coils = Some(Box::new(handler));
    }

    /// Install the Read Holding / Input Registers handler.
    pub fn on_read_registers<F>(&mut self, handler: F)
    where
        F: FnMut(FunctionCode, u16, u16, &mut ResponseData<'_>) + 'static,
    {
        self.handlers.read_registers = Some(Box::new(handler));
    }

    /// Install the Write Single Coil handler.
    pub fn on_write_coil<F>(&mut self, handler: F)
    where
        F: FnMut(FunctionCode, u16, bool) + 'static,
    {
        self.handlers.write_coil = Some(Box::new(handler));
    }

    /// Install the Write Multiple Registers handler.
    pub fn on_write_registers<F>(&mut self, handler: F)
    where
        F: FnMut(FunctionCode, u16, u16, &RequestData<'_>) + 'static,
    {
        self.handlers.write_registers = Some(Box::new(handler));
    }

    /// Remove the handler for `kind`.
    pub fn clear_handler(&mut self, kind: HandlerKind) {
        self.handlers.clear(kind);
    }

    /// Installed handlers.
    #[must_use]
    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Run one poll cycle.
    ///
    /// Returns the number of response bytes transmitted, or `0` when idle
    /// or when the request was dropped.
    pub fn poll(&mut self) -> usize {
        self.stats.polls += 1;
        self.admit_pending();

        let received = self.acquire();
        if received == 0 {
            return 0;
        }
        self.stats.frames_received += 1;
        trace!(received, "Request frame read");

        match self.respond(received) {
            Ok(len) => self.transmit(len),
            Err(reason) => {
                self.stats.record_drop(reason);
                0
            }
        }
    }

    /// Process a request frame without touching the transport.
    ///
    /// Bytes beyond the buffer capacity are ignored, as they would be when
    /// read from a connection.
    ///
    /// # Errors
    ///
    /// Returns the [`DropReason`] if the frame is rejected.
    pub fn process(&mut self, request: &[u8]) -> Result<&[u8], DropReason> {
        let len = request.len().min(N);
        self.input[..len].copy_from_slice(&request[..len]);
        match self.respond(len) {
            Ok(out_len) => Ok(&self.output[..out_len]),
            Err(reason) => {
                self.stats.record_drop(reason);
                Err(reason)
            }
        }
    }

    fn admit_pending(&mut self) {
        let Some(mut incoming) = self.transport.accept_pending() else {
            return;
        };

        match self.client.as_mut() {
            Some(current) if current.is_connected() => {
                incoming.close();
                self.stats.connections_rejected += 1;
                debug!("Client already attached, rejected new connection");
            }
            _ => {
                if let Some(mut stale) = self.client.take() {
                    stale.close();
                }
                self.client = Some(incoming);
                self.stats.connections_accepted += 1;
                info!("Client connection admitted");
            }
        }
    }

    fn acquire(&mut self) -> usize {
        let Some(client) = self.client.as_mut() else {
            return 0;
        };
        if !client.is_connected() || !client.has_available() {
            return 0;
        }
        client.read_available(&mut self.input)
    }

    /// Validate `input[..len]` and build the response in `output`.
    ///
    /// Returns the response length.
    fn respond(&mut self, len: usize) -> Result<usize, DropReason> {
        let request = &self.input[..len];

        if len < MIN_REQUEST_LEN {
            return Err(self.drop_frame(DropReason::TooShort, len));
        }
        if request[UNIT_ID_OFFSET] != self.unit_id {
            trace!(
                unit_id = request[UNIT_ID_OFFSET],
                expected = self.unit_id,
                "Request for another unit"
            );
            return Err(self.drop_frame(DropReason::UnitIdMismatch, len));
        }
        if self.strict_mbap && !mbap_consistent(request) {
            return Err(self.drop_frame(DropReason::MbapMismatch, len));
        }

        let raw_function = request[FUNCTION_OFFSET];
        let Some(function) = FunctionCode::from_byte(raw_function) else {
            trace!(function = raw_function, "Unsupported function code");
            return Err(self.drop_frame(DropReason::UnknownFunction, len));
        };

        let address = be_u16(request, PAYLOAD_OFFSET);
        let value = be_u16(request, PAYLOAD_OFFSET + 2);

        let out_len = self
            .dispatch(function, address, value, len)
            .map_err(|reason| self.drop_frame(reason, len))?;

        self.finalize(function, out_len);
        trace!(%function, address, value, out_len, "Response built");
        Ok(out_len)
    }

    /// Run the per-function checks, build the payload and call the handler.
    ///
    /// `value` is the count for reads and multi-writes, the coil status for
    /// Write Single Coil. Returns the response length.
    fn dispatch(
        &mut self,
        function: FunctionCode,
        address: u16,
        value: u16,
        len: usize,
    ) -> Result<usize, DropReason> {
        match function {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => {
                check_count::<N>(value)?;
                check_exact(len, MIN_REQUEST_LEN)?;
                let byte_count = usize::from(value).div_ceil(8);
                let out_len = self.prepare_read(byte_count)?;
                if let Some(handler) = self.handlers.read_coils.as_mut() {
                    let mut data =
                        ResponseData::new(&mut self.output[RESPONSE_DATA_OFFSET..], byte_count);
                    handler(function, address, value, &mut data);
                }
                Ok(out_len)
            }
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => {
                check_count::<N>(value)?;
                check_exact(len, MIN_REQUEST_LEN)?;
                let byte_count = 2 * usize::from(value);
                let out_len = self.prepare_read(byte_count)?;
                if let Some(handler) = self.handlers.read_registers.as_mut() {
                    let mut data =
                        ResponseData::new(&mut self.output[RESPONSE_DATA_OFFSET..], byte_count);
                    handler(function, address, value, &mut data);
                }
                Ok(out_len)
            }
            FunctionCode::WriteSingleCoil => {
                check_exact(len, MIN_REQUEST_LEN)?;
                self.echo_payload();
                if let Some(handler) = self.handlers.write_coil.as_mut() {
                    handler(function, address, value == COIL_ON);
                }
                Ok(WRITE_RESPONSE_LEN)
            }
            FunctionCode::WriteMultipleRegisters => {
                check_count::<N>(value)?;
                check_exact(len, REQUEST_DATA_OFFSET + 2 * usize::from(value))?;
                self.echo_payload();
                if let Some(handler) = self.handlers.write_registers.as_mut() {
                    let data = RequestData::new(&self.input[REQUEST_DATA_OFFSET..len]);
                    handler(function, address, value, &data);
                }
                Ok(WRITE_RESPONSE_LEN)
            }
        }
    }

    /// Zero the data region of a read response and set its byte count.
    fn prepare_read(&mut self, byte_count: usize) -> Result<usize, DropReason> {
        let out_len = RESPONSE_DATA_OFFSET + byte_count;
        let Ok(count_field) = u8::try_from(byte_count) else {
            return Err(DropReason::ResponseExceedsCapacity);
        };
        if out_len > N {
            return Err(DropReason::ResponseExceedsCapacity);
        }
        self.output[BYTE_COUNT_OFFSET] = count_field;
        self.output[RESPONSE_DATA_OFFSET..out_len].fill(0);
        Ok(out_len)
    }

    /// Copy the 4 payload bytes (address + value/count) into the response.
    fn echo_payload(&mut self) {
        self.output[PAYLOAD_OFFSET..WRITE_RESPONSE_LEN]
            .copy_from_slice(&self.input[PAYLOAD_OFFSET..WRITE_RESPONSE_LEN]);
    }

    /// Fill in the prefix, unit id and function code.
    fn finalize(&mut self, function: FunctionCode, out_len: usize) {
        let header = MbapHeader {
            transaction_id: be_u16(&self.input, 0),
            protocol_id: 0,
            // out_len <= N, and N is bounded well below u16::MAX in practice
            length: u16::try_from(out_len - MBAP_LEN).unwrap_or(u16::MAX),
        };
        header.write_to(&mut self.output);
        self.output[UNIT_ID_OFFSET] = self.unit_id;
        self.output[FUNCTION_OFFSET] = function.as_byte();
    }

    fn transmit(&mut self, len: usize) -> usize {
        let Some(client) = self.client.as_mut().filter(|c| c.is_connected()) else {
            self.stats.send_failures += 1;
            debug!(len, "Client gone before response could be sent");
            return 0;
        };

        match client.write(&self.output[..len]) {
            Ok(written) => {
                self.stats.record_response(written);
                written
            }
            Err(e) => {
                warn!(error = %e, "Failed to send response, closing client");
                self.stats.send_failures += 1;
                self.disconnect();
                0
            }
        }
    }

    fn drop_frame(&self, reason: DropReason, len: usize) -> DropReason {
        debug!(%reason, len, "Request dropped");
        reason
    }
}

impl<T: Transport, const N: usize> std::fmt::Debug for FrameProcessor<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProcessor")
            .field("unit_id", &self.unit_id)
            .field("capacity", &N)
            .field("strict_mbap", &self.strict_mbap)
            .field("has_client", &self.client.is_some())
            .field("handlers", &self.handlers)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn check_count<const N: usize>(count: u16) -> Result<(), DropReason> {
    if usize::from(count) > N {
        return Err(DropReason::CountExceedsCapacity);
    }
    Ok(())
}

fn check_exact(len: usize, expected: usize) -> Result<(), DropReason> {
    if len != expected {
        return Err(DropReason::LengthMismatch);
    }
    Ok(())
}

fn mbap_consistent(request: &[u8]) -> bool {
    MbapHeader::from_bytes(request).is_some_and(|header| {
        header.protocol_id == 0 && usize::from(header.length) == request.len() - MBAP_LEN
    })
}
