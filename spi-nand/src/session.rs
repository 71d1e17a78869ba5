use embedded_nand::PageIndex;

/// State of a single erase or program unit.
///
/// `Idle -> WriteEnableAsserted -> CommandIssued -> Busy -> Ready | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Idle,
    WriteEnableAsserted,
    CommandIssued,
    Busy,
    Ready,
    Failed,
}

impl SessionState {
    /// Whether `next` may directly follow this state
    pub fn can_advance(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, WriteEnableAsserted)
                | (WriteEnableAsserted, CommandIssued)
                | (CommandIssued, Busy)
                | (Busy, Ready)
                | (Busy, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Failed)
    }
}

/// Which state changing command a session drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum UnitKind {
    Erase,
    Program,
}

/// One erase or program unit, owned by the engine issuing it and dropped once terminal.
#[derive(Debug)]
pub(crate) struct CommandSession {
    kind: UnitKind,
    page: PageIndex,
    state: SessionState,
}

impl CommandSession {
    pub(crate) fn new(kind: UnitKind, page: PageIndex) -> Self {
        CommandSession {
            kind,
            page,
            state: SessionState::Idle,
        }
    }

    pub(crate) fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance(next),
            "illegal session transition {:?} -> {:?}",
            self.state,
            next
        );
        trace!(
            "{:?} page {}: {:?} -> {:?}",
            self.kind,
            self.page.as_u32(),
            self.state,
            next
        );
        self.state = next;
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }
}
