/// The client's view of one logical gateway session. Survives reconnects;
/// cleared only when the server declares the session non-resumable or the
/// client is destroyed.
#[derive(Debug, Clone, Default)]
pub struct Session {
    session_id: Option<String>,
    sequence: Option<u64>,
    resume_gateway_url: Option<String>,
}

impl Session {
    /// Record an inbound sequence number. Never moves backwards; the
    /// resume handshake is unsafe otherwise.
    pub fn observe_seq(&mut self, seq: u64) {
        if self.sequence.map_or(true, |current| seq > current) {
            self.sequence = Some(seq);
        }
    }

    /// Populate from a successful READY handshake.
    pub fn establish(&mut self, session_id: String, resume_gateway_url: String) {
        self.session_id = Some(session_id);
        self.resume_gateway_url = Some(resume_gateway_url);
    }

    /// Forget everything; the next handshake starts fresh with IDENTIFY.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.resume_gateway_url.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn resume_gateway_url(&self) -> Option<&str> {
        self.resume_gateway_url.as_deref()
    }
}
