use super::amount::Uint128;
use super::block::{Block, CommonFields, OpenBlock};
use super::crypto::{Account, BlockHash, CryptoError, KeyPair, Signature};
use super::work::Work;
use crate::config::Network;

/// Private key of the test network genesis account
pub const TEST_PRIVATE_KEY: &str = "34f0a37aad20f4a260f0a5b3cb3d7fb50673212263e58a380bc10474bb039ce4";

/// Public key of the live network genesis account
const LIVE_GENESIS_ACCOUNT: &str = "3d4fc49b8829cab42f42d37297e04f589393cb2bcf7f67cdafcd2399be99b376";

/// Signature of the live genesis open block by its account
const LIVE_GENESIS_SIGNATURE: &str = "11ea031934d7be63ede0fd0e058d19aa75457c6ef31d399537e66849878d0726\
22298dac770ede26a47e3f3992359139bc83026b7c35e8a9d5b5fbd85a45fb04";

/// Balance the genesis account starts with
pub const GENESIS_AMOUNT: Uint128 = Uint128::MAX;

/// Keys controlling the test network genesis account
///
/// The live genesis key is not part of the node; its block ships pre-signed.
pub fn test_genesis_keys() -> Result<KeyPair, CryptoError> {
    KeyPair::from_hex(TEST_PRIVATE_KEY)
}

/// The account holding the genesis supply of a network
pub fn genesis_account(network: Network) -> Result<Account, CryptoError> {
    match network {
        Network::Live => {
            let mut bytes = [0u8; 32];
            hex::decode_to_slice(LIVE_GENESIS_ACCOUNT, &mut bytes)
                .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
            Ok(Account(bytes))
        }
        Network::Test => Ok(test_genesis_keys()?.account()),
    }
}

fn live_genesis_signature() -> Result<Signature, CryptoError> {
    let mut bytes = [0u8; 64];
    hex::decode_to_slice(LIVE_GENESIS_SIGNATURE, &mut bytes).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
    Ok(Signature::from_bytes(&bytes))
}

/// The open block every chain of a network descends from
///
/// Its source is the genesis account itself since no send precedes it, and it
/// carries no work: the store seeds it directly instead of accepting it.
pub fn genesis_block(network: Network) -> Result<Block, CryptoError> {
    let account = genesis_account(network)?;

    let mut block = Block::Open(OpenBlock {
        source: BlockHash(account.0),
        representative: account,
        account,
        balance: GENESIS_AMOUNT,
        common: CommonFields::unsigned(Work(0)),
    });

    match network {
        Network::Live => block.common_mut().signature = live_genesis_signature()?,
        Network::Test => block.sign(&test_genesis_keys()?),
    }

    Ok(block)
}

pub fn genesis_hash(network: Network) -> Result<BlockHash, CryptoError> {
    Ok(genesis_block(network)?.hash())
}
