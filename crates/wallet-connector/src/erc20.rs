use num_bigint::BigUint;

use crate::abi::{self, Token};
use crate::error::CallError;
use crate::provider::{BrowserProvider, Signer};
use crate::types::address::Address;

const BALANCE_OF: &str = "balanceOf(address)";
const DECIMALS: &str = "decimals()";
const SYMBOL: &str = "symbol()";
const NAME: &str = "name()";
const TRANSFER: &str = "transfer(address,uint256)";

/// Read/write binding for an ERC-20 contract, borrowing a provider handle.
#[derive(Debug, Clone, Copy)]
pub struct Erc20<'a> {
    address: Address,
    provider: &'a BrowserProvider,
}

impl<'a> Erc20<'a> {
    pub fn new(address: Address, provider: &'a BrowserProvider) -> Self {
        Self { address, provider }
    }

    /// Validate `address` before binding; malformed input is
    /// [`CallError::InvalidArgument`].
    pub fn at(address: &str, provider: &'a BrowserProvider) -> Result<Self, CallError> {
        Ok(Self::new(Address::parse(address)?, provider))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn balance_of(&self, owner: &Address) -> Result<BigUint, CallError> {
        let data = self.call(BALANCE_OF, &[Token::Address(*owner)]).await?;
        Ok(abi::decode_uint(&data)?)
    }

    pub async fn decimals(&self) -> Result<u8, CallError> {
        let data = self.call(DECIMALS, &[]).await?;
        Ok(abi::decode_u8(&data)?)
    }

    pub async fn symbol(&self) -> Result<String, CallError> {
        let data = self.call(SYMBOL, &[]).await?;
        Ok(abi::decode_string(&data)?)
    }

    pub async fn name(&self) -> Result<String, CallError> {
        let data = self.call(NAME, &[]).await?;
        Ok(abi::decode_string(&data)?)
    }

    /// Submit `transfer(to, amount)` signed by `signer`; returns the tx hash.
    ///
    /// This only submits. Callers wait for the receipt separately.
    pub async fn transfer(
        &self,
        signer: &Signer,
        to: &Address,
        amount: BigUint,
    ) -> Result<String, CallError> {
        let calldata = abi::encode_call(TRANSFER, &[Token::Address(*to), Token::Uint(amount)]);
        signer.send_transaction(&self.address, &calldata).await
    }

    async fn call(&self, signature: &str, args: &[Token]) -> Result<Vec<u8>, CallError> {
        let calldata = abi::encode_call(signature, args);
        self.provider.call(&self.address, &calldata).await
    }
}
