use merkle_tree_storage::Pubkey;

const ADDRESS_DOMAIN: &[u8] = b"merkle_tree_storage/address";

/// The address a payer's tree must live at.
///
/// `blake3(domain || program_id || len(seed) || seed || payer)`, with the
/// length as a big-endian `u32`. The address is a pure function of its
/// inputs, so each payer has exactly one tree per program and seed.
pub fn derive_tree_address(program_id: &Pubkey, seed: &[u8], payer: &Pubkey) -> Pubkey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(ADDRESS_DOMAIN);
    hasher.update(program_id.as_ref());
    hasher.update(&(seed.len() as u32).to_be_bytes());
    hasher.update(seed);
    hasher.update(payer.as_ref());
    Pubkey::new_from_array(*hasher.finalize().as_bytes())
}
