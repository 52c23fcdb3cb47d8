//! Solidity interface bindings for the ERC-20 token and the xReserve
//! reserve contract.

use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

sol! {
    #[derive(Debug)]
    interface IXReserve {
        /// Locks `amount` of `localToken` and emits the cross-chain message
        /// minting to `remoteRecipient` on `remoteDomain`.
        function depositToRemote(
            uint256 amount,
            uint32 remoteDomain,
            bytes32 remoteRecipient,
            address localToken,
            uint256 maxFee,
            bytes hookData
        ) external;
    }
}
