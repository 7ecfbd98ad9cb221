//! Mock protocol engine and transport for unit tests

use crate::address::{BdAddr, DeviceAddress};
use crate::error::{GapError, TransportError};
use crate::gap::*;
use crate::transport::{ByteSink, DeviceSelector, Transport};
use crate::uuid::Uuid;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum LinkCall {
    Disconnect(u8),
    UpdateParameters(ConnectionParameterRequest, bool),
    StartAuthentication,
    SetSecurity(SecurityParameters),
    Passkey(u32),
}

pub struct MockClient {
    closed: Arc<AtomicBool>,
}

impl ClientProfile for MockClient {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct MockLink {
    handle: u16,
    address: Mutex<DeviceAddress>,
    identity: Mutex<Option<DeviceAddress>>,
    security: Mutex<Option<SecurityInfo>>,
    delegate: Mutex<Option<Arc<dyn ConnectionDelegate>>>,
    hooks: Mutex<Option<Arc<dyn ClientConfigurationHooks>>>,
    server: Mutex<Option<Arc<dyn ServerProfile>>>,
    client_closed: Arc<AtomicBool>,
    fail_open_client: AtomicBool,
    calls: Mutex<Vec<LinkCall>>,
}

impl MockLink {
    pub fn new(handle: u16, address: DeviceAddress) -> Arc<Self> {
        Arc::new(Self {
            handle,
            address: Mutex::new(address),
            identity: Mutex::new(None),
            security: Mutex::new(None),
            delegate: Mutex::new(None),
            hooks: Mutex::new(None),
            server: Mutex::new(None),
            client_closed: Arc::new(AtomicBool::new(false)),
            fail_open_client: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_identity(&self, identity: Option<DeviceAddress>) {
        *self.identity.lock().unwrap() = identity;
    }

    pub fn set_security(&self, security: Option<SecurityInfo>) {
        *self.security.lock().unwrap() = security;
    }

    pub fn fail_open_client(&self) {
        self.fail_open_client.store(true, Ordering::SeqCst);
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.lock().unwrap().is_some()
    }

    pub fn hooks(&self) -> Option<Arc<dyn ClientConfigurationHooks>> {
        self.hooks.lock().unwrap().clone()
    }

    /// Server profile the bearer was opened over
    pub fn server(&self) -> Option<Arc<dyn ServerProfile>> {
        self.server.lock().unwrap().clone()
    }

    pub fn client_closed(&self) -> bool {
        self.client_closed.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Delivers an event the way the engine does: to whichever delegate is
    /// bound at the time, with no lock held during the call.
    pub fn fire(&self, event: impl FnOnce(&dyn ConnectionDelegate)) -> bool {
        let delegate = self.delegate.lock().unwrap().clone();
        match delegate {
            Some(delegate) => {
                event(delegate.as_ref());
                true
            }
            None => false,
        }
    }

    fn record(&self, call: LinkCall) -> Result<(), GapError> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl LinkConnection for MockLink {
    fn handle(&self) -> u16 {
        self.handle
    }

    fn address(&self) -> DeviceAddress {
        *self.address.lock().unwrap()
    }

    fn identity(&self) -> Option<DeviceAddress> {
        *self.identity.lock().unwrap()
    }

    fn is_peripheral(&self) -> bool {
        true
    }

    fn parameters(&self) -> ConnectionParameters {
        ConnectionParameters {
            interval: 0x0008,
            latency: 0,
            supervision_timeout: 0x00C8,
        }
    }

    fn is_encrypted(&self) -> bool {
        self.security.lock().unwrap().is_some()
    }

    fn security_info(&self) -> Option<SecurityInfo> {
        *self.security.lock().unwrap()
    }

    fn bind_delegate(&self, delegate: Option<Arc<dyn ConnectionDelegate>>) {
        *self.delegate.lock().unwrap() = delegate;
    }

    fn open_client(
        &self,
        server: Arc<dyn ServerProfile>,
        hooks: Arc<dyn ClientConfigurationHooks>,
    ) -> Result<Box<dyn ClientProfile>, GapError> {
        if self.fail_open_client.load(Ordering::SeqCst) {
            return Err(GapError::Rejected("no ATT bearer".into()));
        }
        *self.server.lock().unwrap() = Some(server);
        *self.hooks.lock().unwrap() = Some(hooks);
        Ok(Box::new(MockClient {
            closed: self.client_closed.clone(),
        }))
    }

    fn disconnect(&self, reason: u8) -> Result<(), GapError> {
        self.record(LinkCall::Disconnect(reason))
    }

    fn update_connection_parameters(
        &self,
        parameters: &ConnectionParameterRequest,
        l2cap: bool,
    ) -> Result<(), GapError> {
        self.record(LinkCall::UpdateParameters(*parameters, l2cap))
    }

    fn start_authentication(&self) -> Result<(), GapError> {
        self.record(LinkCall::StartAuthentication)
    }

    fn set_security_parameters(&self, parameters: &SecurityParameters) -> Result<(), GapError> {
        self.record(LinkCall::SetSecurity(*parameters))
    }

    fn passkey_entry(&self, passkey: u32) -> Result<(), GapError> {
        self.record(LinkCall::Passkey(passkey))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerCall {
    AddService(Uuid, bool),
    AddCharacteristic(u16, Uuid, CharacteristicProperties, Vec<u8>),
    SetValue(u16, Vec<u8>),
}

/// Attribute database that hands out consecutive handles
#[derive(Default)]
pub struct MockServer {
    next_handle: Mutex<u16>,
    calls: Mutex<Vec<ServerCall>>,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<ServerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Records `call` and reserves `count` handles, returning the first.
    fn allocate(&self, count: u16, call: ServerCall) -> u16 {
        self.calls.lock().unwrap().push(call);
        let mut next = self.next_handle.lock().unwrap();
        let first = *next + 1;
        *next += count;
        first
    }
}

impl ServerProfile for MockServer {
    fn add_service(&self, uuid: Uuid, is_primary: bool) -> Result<u16, GapError> {
        Ok(self.allocate(1, ServerCall::AddService(uuid, is_primary)))
    }

    fn add_characteristic(
        &self,
        service_handle: u16,
        uuid: Uuid,
        properties: CharacteristicProperties,
        initial_value: Vec<u8>,
    ) -> Result<u16, GapError> {
        // Declaration, value, then the CCC descriptor if subscribable
        let count = if properties.has_client_configuration() { 3 } else { 2 };
        let call = ServerCall::AddCharacteristic(service_handle, uuid, properties, initial_value);
        let value_handle = self.allocate(count, call) + 1;
        Ok(value_handle)
    }

    fn set_value(&self, value_handle: u16, value: &[u8]) -> Result<(), GapError> {
        self.calls
            .lock()
            .unwrap()
            .push(ServerCall::SetValue(value_handle, value.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GapCall {
    Init { controller_mode: bool },
    SetStaticAddress(BdAddr),
    StartScanning(ScanParameters),
    StopScanning,
    Connect(Option<DeviceAddress>, Option<ConnectionParameterRequest>),
    StartAdvertising(EncodedAdvertising),
    StopAdvertising,
    Privacy(bool),
    WhiteList(Vec<DeviceAddress>),
}

#[derive(Default)]
pub struct MockGap {
    public_address: Mutex<Option<BdAddr>>,
    delegate: Mutex<Option<Weak<dyn GapDelegate>>>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    received: Mutex<Vec<u8>>,
    calls: Mutex<Vec<GapCall>>,
}

impl MockGap {
    pub fn new(public_address: Option<BdAddr>) -> Arc<Self> {
        let gap = Self::default();
        *gap.public_address.lock().unwrap() = public_address;
        Arc::new(gap)
    }

    pub fn delegate(&self) -> Arc<dyn GapDelegate> {
        self.delegate
            .lock()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade)
            .expect("GAP layer not initialized")
    }

    pub fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<u8> {
        self.received.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<GapCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: GapCall) -> Result<(), GapError> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl GapLayer for MockGap {
    fn init(
        &self,
        transport: Arc<dyn Transport>,
        delegate: Weak<dyn GapDelegate>,
        controller_mode: bool,
    ) -> Result<(), GapError> {
        *self.transport.lock().unwrap() = Some(transport);
        *self.delegate.lock().unwrap() = Some(delegate);
        self.record(GapCall::Init { controller_mode })
    }

    fn receive(&self, data: &[u8], offset: usize, len: usize) {
        self.received
            .lock()
            .unwrap()
            .extend_from_slice(&data[offset..offset + len]);
    }

    fn public_address(&self) -> Option<BdAddr> {
        *self.public_address.lock().unwrap()
    }

    fn set_static_address(&self, address: BdAddr) -> Result<(), GapError> {
        self.record(GapCall::SetStaticAddress(address))
    }

    fn start_scanning(&self, parameters: &ScanParameters) -> Result<(), GapError> {
        self.record(GapCall::StartScanning(parameters.clone()))
    }

    fn stop_scanning(&self) -> Result<(), GapError> {
        self.record(GapCall::StopScanning)
    }

    fn establish_connection(
        &self,
        address: Option<DeviceAddress>,
        parameters: Option<ConnectionParameterRequest>,
    ) -> Result<(), GapError> {
        self.record(GapCall::Connect(address, parameters))
    }

    fn start_advertising(&self, parameters: &EncodedAdvertising) -> Result<(), GapError> {
        self.record(GapCall::StartAdvertising(parameters.clone()))
    }

    fn stop_advertising(&self) -> Result<(), GapError> {
        self.record(GapCall::StopAdvertising)
    }

    fn enable_privacy_feature(&self, enabled: bool) -> Result<(), GapError> {
        self.record(GapCall::Privacy(enabled))
    }

    fn set_white_list(&self, addresses: &[DeviceAddress]) -> Result<(), GapError> {
        self.record(GapCall::WhiteList(addresses.to_vec()))
    }
}

/// In-memory transport fed by the test
#[derive(Default)]
pub struct MockTransport {
    open: AtomicBool,
    fail_open: AtomicBool,
    inbound: Mutex<VecDeque<Vec<u8>>>,
    written: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let transport = Self::default();
        transport.fail_open.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    pub fn push_inbound(&self, chunk: &[u8]) {
        self.inbound.lock().unwrap().push_back(chunk.to_vec());
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn init(&self, _selector: &DeviceSelector) -> Result<(), TransportError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Open(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such device",
            )));
        }
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write(&self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        self.written.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }

    fn poll(&self, sink: &mut dyn ByteSink, _timeout: Option<Duration>) -> Result<usize, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let mut total = 0;
        loop {
            let chunk = self.inbound.lock().unwrap().pop_front();
            let Some(chunk) = chunk else { break };
            total += chunk.len();
            sink.receive(&chunk, 0, chunk.len());
        }
        Ok(total)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}
