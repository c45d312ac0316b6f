#![allow(dead_code)]

use analysis::{
    AnalysisEngine, ByteRange, CaptureHandle, Clock, Collaborators, DiskRef, Emulator,
    ForensicIndex, GuestAgent, HiveKind, HiveLog, HookId, ImageId, NotificationSink,
    PacketLayer, PacketObserver, ParsedPacket, ProcessObserver, SyscallEvent, SyscallFilter,
    SyscallLayer, SyscallObserver, TaintEngine, TaintTag, TaskId, TaskState, TraceId,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const IMAGE: ImageId = ImageId(1);

#[derive(Default)]
pub struct MockAgent {
    ready: AtomicBool,
    pub calls: Mutex<Vec<String>>,
}

impl MockAgent {
    pub fn ready() -> Self {
        let agent = Self::default();
        agent.ready.store(true, Ordering::SeqCst);
        agent
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl GuestAgent for MockAgent {
    async fn import(&self, guest_path: &str, _host_path: &Path) -> Result<(), analysis::Error> {
        self.calls.lock().unwrap().push(format!("import {guest_path}"));
        Ok(())
    }

    async fn invoke(&self, guest_path: &str) -> Result<(), analysis::Error> {
        self.calls.lock().unwrap().push(format!("invoke {guest_path}"));
        Ok(())
    }

    async fn sync_guest(&self) -> Result<(), analysis::Error> {
        self.calls.lock().unwrap().push("sync".into());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

pub struct MockEmulator {
    pub capacity: u64,
    pub memory: Mutex<HashMap<u64, u8>>,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
}

impl MockEmulator {
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity,
            memory: Mutex::new(HashMap::new()),
            pauses: AtomicUsize::new(0),
            resumes: AtomicUsize::new(0),
        }
    }

    pub fn write_memory(&self, addr: u64, bytes: &[u8]) {
        let mut memory = self.memory.lock().unwrap();
        for (offset, byte) in bytes.iter().enumerate() {
            memory.insert(addr + offset as u64, *byte);
        }
    }
}

impl Emulator for MockEmulator {
    fn primary_disk(&self) -> Option<DiskRef> {
        Some(DiskRef {
            image: IMAGE,
            capacity: self.capacity,
        })
    }

    fn read_phys(&self, addr: u64, buf: &mut [u8]) -> Result<(), analysis::Error> {
        let memory = self.memory.lock().unwrap();
        for (offset, slot) in buf.iter_mut().enumerate() {
            *slot = memory.get(&(addr + offset as u64)).copied().unwrap_or(0);
        }
        Ok(())
    }

    fn pause(&self) {
        self.pauses.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.resumes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockTaint {
    enabled: AtomicBool,
    pub disk: Mutex<HashMap<u64, u64>>,
    pub memory: Mutex<HashSet<u64>>,
}

impl MockTaint {
    pub fn enabled() -> Self {
        let taint = Self::default();
        taint.enabled.store(true, Ordering::SeqCst);
        taint
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Pre-mark disk addresses as dirty for a tag mask.
    pub fn dirty_disk(&self, addrs: &[u64], mask: u64) {
        let mut disk = self.disk.lock().unwrap();
        for addr in addrs {
            *disk.entry(*addr).or_insert(0) |= mask;
        }
    }

    pub fn dirty_memory(&self, addr: u64) {
        self.memory.lock().unwrap().insert(addr);
    }
}

impl TaintEngine for MockTaint {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn contaminate_disk_or(&self, start: u64, len: u64, tag: TaintTag) {
        let mut disk = self.disk.lock().unwrap();
        for addr in start..start + len {
            *disk.entry(addr).or_insert(0) |= tag.bits();
        }
    }

    fn disk_dirty(&self, addr: u64) -> u64 {
        self.disk.lock().unwrap().get(&addr).copied().unwrap_or(0)
    }

    fn memory_dirty(&self, addr: u64) -> bool {
        self.memory.lock().unwrap().contains(&addr)
    }
}

#[derive(Default)]
pub struct MockIndex {
    /// path -> extents, in file order.
    pub files: Mutex<HashMap<String, Vec<ByteRange>>>,
    pub file_bytes: Mutex<HashMap<String, Vec<u8>>>,
    /// (hive, hive-file offset) -> value names.
    pub registry: Mutex<HashMap<(HiveKind, u64), Vec<String>>>,
    pub hive_log: Mutex<Option<HiveLog>>,
    pub parsed_hives: Mutex<Vec<HiveKind>>,
    /// Paths whose extents are hidden from address lookups, simulating a
    /// stale extent list whose clusters were reassigned.
    pub stale: Mutex<HashSet<String>>,
}

impl MockIndex {
    pub fn add_file(&self, path: &str, extents: Vec<ByteRange>) {
        self.files.lock().unwrap().insert(path.into(), extents);
    }

    pub fn add_file_bytes(&self, path: &str, bytes: Vec<u8>) {
        self.file_bytes.lock().unwrap().insert(path.into(), bytes);
    }

    pub fn add_registry_value(&self, hive: HiveKind, offset: u64, name: &str) {
        self.registry
            .lock()
            .unwrap()
            .entry((hive, offset))
            .or_default()
            .push(name.into());
    }

    pub fn set_hive_log(&self, log: HiveLog) {
        *self.hive_log.lock().unwrap() = Some(log);
    }

    pub fn mark_stale(&self, path: &str) {
        self.stale.lock().unwrap().insert(path.into());
    }
}

impl ForensicIndex for MockIndex {
    fn ranges_for_path(&self, _image: ImageId, path: &str) -> Vec<ByteRange> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn paths_at(&self, _image: ImageId, addr: u64) -> Vec<String> {
        let files = self.files.lock().unwrap();
        let stale = self.stale.lock().unwrap();
        let mut owners: Vec<String> = files
            .iter()
            .filter(|(path, _)| !stale.contains(path.as_str()))
            .filter(|(_, extents)| extents.iter().any(|extent| extent.contains(addr)))
            .map(|(path, _)| path.clone())
            .collect();
        owners.sort();
        owners
    }

    fn read_file(&self, _image: ImageId, path: &str) -> Result<Vec<u8>, analysis::Error> {
        self.file_bytes
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| analysis::Error::Fail(format!("no content for {path}")))
    }

    fn parse_hive(&self, kind: HiveKind, _bytes: &[u8]) -> Result<(), analysis::Error> {
        self.parsed_hives.lock().unwrap().push(kind);
        Ok(())
    }

    fn registry_values_at(
        &self,
        kind: HiveKind,
        offset: u64,
        _ranges: &[ByteRange],
    ) -> Vec<String> {
        self.registry
            .lock()
            .unwrap()
            .get(&(kind, offset))
            .cloned()
            .unwrap_or_default()
    }

    fn parse_hive_log(&self, _bytes: &[u8]) -> Result<HiveLog, analysis::Error> {
        self.hive_log
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| analysis::Error::Fail("no log layout configured".into()))
    }
}

type TraceEntry = (TraceId, u64, SyscallFilter, Arc<dyn SyscallObserver>);

#[derive(Default)]
pub struct MockSyscallLayer {
    pub exports: Mutex<HashMap<String, u64>>,
    pub hook_installs: AtomicUsize,
    process_observer: Mutex<Option<Arc<dyn ProcessObserver>>>,
    traces: Mutex<Vec<TraceEntry>>,
    detached: Mutex<Vec<TraceId>>,
    next_id: AtomicU64,
}

impl MockSyscallLayer {
    pub fn with_export(symbol: &str, addr: u64) -> Self {
        let layer = Self::default();
        layer.exports.lock().unwrap().insert(symbol.into(), addr);
        layer
    }

    pub fn active_trace_count(&self) -> usize {
        let detached = self.detached.lock().unwrap();
        self.traces
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, ..)| !detached.contains(id))
            .count()
    }

    /// Simulate the guest creating a process.
    pub fn spawn_process(&self, image_name: &str, address_space: u64) {
        let observer = self.process_observer.lock().unwrap().clone();
        if let Some(observer) = observer {
            observer.on_process_created(image_name, address_space);
        }
    }

    /// Simulate one intercepted syscall in an address space.
    pub fn fire_syscall(&self, address_space: u64, event: SyscallEvent) {
        let observers: Vec<Arc<dyn SyscallObserver>> = {
            let detached = self.detached.lock().unwrap();
            self.traces
                .lock()
                .unwrap()
                .iter()
                .filter(|(id, space, filter, _)| {
                    !detached.contains(id) && *space == address_space && filter.matches(event.number)
                })
                .map(|(.., observer)| Arc::clone(observer))
                .collect()
        };
        for observer in observers {
            observer.on_syscall(&event);
        }
    }
}

impl SyscallLayer for MockSyscallLayer {
    fn resolve_kernel_export(&self, symbol: &str) -> Option<u64> {
        self.exports.lock().unwrap().get(symbol).copied()
    }

    fn hook_process_creation(&self, _addr: u64, observer: Arc<dyn ProcessObserver>) -> HookId {
        self.hook_installs.fetch_add(1, Ordering::SeqCst);
        *self.process_observer.lock().unwrap() = Some(observer);
        HookId(1)
    }

    fn attach_trace(
        &self,
        address_space: u64,
        filter: SyscallFilter,
        observer: Arc<dyn SyscallObserver>,
    ) -> TraceId {
        let id = TraceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.traces
            .lock()
            .unwrap()
            .push((id, address_space, filter, observer));
        id
    }

    fn detach_trace(&self, trace: TraceId) {
        self.detached.lock().unwrap().push(trace);
    }
}

#[derive(Default)]
pub struct MockPacketLayer {
    /// Every observer ever registered; kept so tests can deliver packets
    /// past unregistration.
    observers: Mutex<Vec<Arc<dyn PacketObserver>>>,
    pub parse_result: Mutex<Option<ParsedPacket>>,
    pub capturing: AtomicBool,
    pub unregistered: AtomicUsize,
    next_handle: AtomicU64,
}

impl MockPacketLayer {
    pub fn set_parse_result(&self, packet: Option<ParsedPacket>) {
        *self.parse_result.lock().unwrap() = packet;
    }

    pub fn has_observer(&self) -> bool {
        !self.observers.lock().unwrap().is_empty()
    }

    /// Deliver a captured packet to the most recently registered observer.
    pub fn deliver(&self, length: usize, phys_addr: u64) {
        let observer = self.observers.lock().unwrap().last().cloned();
        if let Some(observer) = observer {
            observer.on_packet(length, phys_addr);
        }
    }
}

impl PacketLayer for MockPacketLayer {
    fn parse(&self, _frame: &[u8]) -> Option<ParsedPacket> {
        self.parse_result.lock().unwrap().clone()
    }

    fn register(&self, observer: Arc<dyn PacketObserver>) -> CaptureHandle {
        self.observers.lock().unwrap().push(observer);
        CaptureHandle(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    fn unregister(&self, _handle: CaptureHandle) {
        self.unregistered.fetch_add(1, Ordering::SeqCst);
    }

    fn start_capture(&self) {
        self.capturing.store(true, Ordering::SeqCst);
    }

    fn stop_capture(&self) {
        self.capturing.store(false, Ordering::SeqCst);
    }
}

/// Clock whose sleeps return immediately, recording the requested
/// durations.
#[derive(Default)]
pub struct InstantClock {
    pub slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Clock for InstantClock {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Clock that parks every sleeper until the test releases it, so a task
/// can be held in the busy state.
pub struct GateClock {
    gate: tokio::sync::Semaphore,
}

impl Default for GateClock {
    fn default() -> Self {
        Self {
            gate: tokio::sync::Semaphore::new(0),
        }
    }
}

impl GateClock {
    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Clock for GateClock {
    async fn sleep(&self, _duration: Duration) {
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
    }
}

#[derive(Default)]
pub struct NotifySpy {
    pub messages: Mutex<Vec<(TaskId, String)>>,
}

impl NotificationSink for NotifySpy {
    fn notify(&self, id: TaskId, message: &str) {
        self.messages.lock().unwrap().push((id, message.into()));
    }
}

/// The full mock collaborator set plus the engine built over it.
pub struct Harness {
    pub agent: Arc<MockAgent>,
    pub emulator: Arc<MockEmulator>,
    pub taint: Arc<MockTaint>,
    pub index: Arc<MockIndex>,
    pub syscalls: Arc<MockSyscallLayer>,
    pub packets: Arc<MockPacketLayer>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            agent: Arc::new(MockAgent::ready()),
            emulator: Arc::new(MockEmulator::with_capacity(0x40000)),
            taint: Arc::new(MockTaint::enabled()),
            index: Arc::new(MockIndex::default()),
            syscalls: Arc::new(MockSyscallLayer::with_export("PspInsertProcess", 0x8055_1000)),
            packets: Arc::new(MockPacketLayer::default()),
        }
    }

    pub fn engine_with(&self, config: config::Config, clock: Arc<dyn Clock>) -> AnalysisEngine {
        AnalysisEngine::new(
            config,
            Collaborators {
                agent: self.agent.clone(),
                emulator: self.emulator.clone(),
                taint: self.taint.clone(),
                index: self.index.clone(),
                syscalls: self.syscalls.clone(),
                packets: self.packets.clone(),
                clock,
            },
        )
    }

    pub fn engine(&self, config: config::Config) -> AnalysisEngine {
        self.engine_with(config, Arc::new(InstantClock::default()))
    }
}

/// Poll until the task reaches `Done`, yielding so the detached analysis
/// task can make progress.
pub async fn wait_done(engine: &AnalysisEngine, id: TaskId) {
    for _ in 0..10_000 {
        let view = engine.task(id).unwrap().expect("task vanished");
        if view.state == TaskState::Done {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("task {id} never finished");
}

/// Poll until `condition` holds while the analysis task progresses.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
