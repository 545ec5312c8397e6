/// A message carried on the lobby. Non-critical messages (state updates)
/// are coalesced under backpressure; critical messages (milestone unlocks)
/// must never be silently dropped.
pub trait LobbyMessage: Clone + Send + Sync + serde::Serialize + serde::de::DeserializeOwned + 'static {
	fn is_critical(&self) -> bool;
}
