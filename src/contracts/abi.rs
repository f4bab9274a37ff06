//! ABI definitions for the contracts read by the rewards engine

#![allow(clippy::too_many_arguments)]

alloy::sol! {
    struct Multicall3Call {
        address target;
        bool allowFailure;
        bytes callData;
    }

    struct Multicall3Result {
        bool success;
        bytes returnData;
    }

    function aggregate3(Multicall3Call[] calldata calls)
        external
        payable
        returns (Multicall3Result[] memory returnData);

    /// Read-only view over the graveyard
    interface IGraveReader {
        function viewGraveWindow(uint256 offset, uint256 limit)
            external
            view
            returns (uint256[] memory ids, uint256 next, uint256 cursor);

        function getBurnInfo(uint256 tokenId)
            external
            view
            returns (
                address owner,
                uint256 totalAmount,
                uint256 claimAt,
                uint256 graveReleaseAt,
                bool claimed,
                uint256 waitMinutes,
                uint256 playerAmount,
                uint256 poolAmount,
                uint256 burnedAmount
            );

        function getLPInfo(uint256 tokenId)
            external
            view
            returns (
                address helper,
                address pair,
                uint256 lpAmount,
                uint256 octaDeposited,
                uint256 pairDeposited
            );
    }

    /// Core game contract
    interface IGraveCore {
        function paused() external view returns (bool);

        function burnSplits(uint256 waitMinutes)
            external
            view
            returns (uint256 playerBps, uint256 poolBps, uint256 burnBps);

        function nftLP(uint256 tokenId)
            external
            view
            returns (
                address helper,
                address pair,
                uint256 lpAmount,
                uint256 octaDeposited,
                uint256 pairDeposited
            );
    }
}
