/// Number of external change notifications buffered per subscriber before older ones are dropped.
pub const CHANGE_CHANNEL_CAPACITY: usize = 64;
