use crate::shared::ParamPage;

// state local to the tui: the sequence edit buffer and a mirror of the
// engine flags input resolution depends on, synced from the snapshot
// once per loop
#[derive(Clone, Debug)]
pub struct TuiState {
    // typing a sequence; keys go into the buffer instead of the pads
    pub seq_edit: bool,
    pub seq_buffer: String,
    // synced from EngineSnapshot each frame
    pub sequence_mode: bool,
    pub param_page: ParamPage,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            seq_edit: false,
            seq_buffer: String::new(),
            sequence_mode: false,
            param_page: ParamPage::Tempo,
        }
    }
}
