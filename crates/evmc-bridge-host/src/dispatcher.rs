//! The engine-facing host interface.
//!
//! [`HostInterfaceDispatcher`] implements [`HostContext`] by routing every
//! operation through its [`CallChannel`] and blocking the calling worker
//! until the host thread has answered. Any failure of a round trip is fatal.

use std::rc::Weak;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use evmc_bridge_common::fatal;
use evmc_bridge_core::{
    AccessStatus, Address, ExecutionResult, HostContext, Message, StorageStatus, TxContext, Word256,
};

use crate::adapter::serve;
use crate::callbacks::HostCallbacks;
use crate::calls::{
    AccessAccount, AccessStorage, AccountExists, Call, CopyCode, EmitLog, GetBalance,
    GetBlockHash, GetCodeHash, GetCodeSize, GetStorage, GetTxContext, HostCall, SelfDestruct,
    SetStorage,
};
use crate::channel::{CallChannel, Submission};

macro_rules! call_channels {
    ($($field:ident: $call:ty),+ $(,)?) => {
        /// One open channel per callback kind.
        #[derive(Debug, Clone)]
        pub struct CallChannels {
            $(pub $field: CallChannel<$call>,)+
        }

        /// Receiving ends of [`CallChannels`], consumed by the serve loops.
        pub struct ChannelReceivers {
            $($field: UnboundedReceiver<Submission<$call>>,)+
        }

        impl CallChannels {
            /// Open every channel. The calling thread becomes the host thread.
            pub fn open() -> (Self, ChannelReceivers) {
                $(let $field = CallChannel::<$call>::open();)+
                (
                    Self { $($field: $field.0,)+ },
                    ChannelReceivers { $($field: $field.1,)+ },
                )
            }

            /// Close every channel. Returns `true` if any was still open.
            pub fn close_all(&self) -> bool {
                let mut closed = false;
                $(closed |= self.$field.close();)+
                closed
            }

            /// Total submissions waiting for an answer across all channels.
            pub fn in_flight(&self) -> usize {
                0 $(+ self.$field.in_flight())+
            }
        }

        impl ChannelReceivers {
            /// Spawn one serve loop per channel on the current `LocalSet`.
            pub fn spawn(self, host: &Weak<dyn HostCallbacks>) -> Vec<JoinHandle<()>> {
                vec![$(tokio::task::spawn_local(serve(self.$field, Weak::clone(host))),)+]
            }
        }
    };
}

call_channels! {
    account_exists: AccountExists,
    get_storage: GetStorage,
    set_storage: SetStorage,
    get_balance: GetBalance,
    get_code_size: GetCodeSize,
    get_code_hash: GetCodeHash,
    copy_code: CopyCode,
    selfdestruct: SelfDestruct,
    call: Call,
    get_tx_context: GetTxContext,
    get_block_hash: GetBlockHash,
    emit_log: EmitLog,
    access_account: AccessAccount,
    access_storage: AccessStorage,
}

impl std::fmt::Debug for ChannelReceivers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelReceivers").finish_non_exhaustive()
    }
}

/// Routes engine callbacks to the host thread.
#[derive(Debug, Clone)]
pub struct HostInterfaceDispatcher {
    channels: Arc<CallChannels>,
}

impl HostInterfaceDispatcher {
    /// Create a dispatcher over an open channel set.
    pub fn new(channels: CallChannels) -> Self {
        Self {
            channels: Arc::new(channels),
        }
    }

    /// The channels this dispatcher submits to.
    pub fn channels(&self) -> &CallChannels {
        &self.channels
    }

    fn round_trip<C: HostCall>(channel: &CallChannel<C>, request: C) -> C::Output {
        channel
            .submit(request)
            .unwrap_or_else(|error| fatal(C::NAME, &error))
    }
}

impl HostContext for HostInterfaceDispatcher {
    fn account_exists(&self, address: &Address) -> bool {
        Self::round_trip(
            &self.channels.account_exists,
            AccountExists { address: *address },
        )
    }

    fn get_storage(&self, address: &Address, key: &Word256) -> Word256 {
        Self::round_trip(
            &self.channels.get_storage,
            GetStorage {
                address: *address,
                key: *key,
            },
        )
    }

    fn set_storage(&self, address: &Address, key: &Word256, value: &Word256) -> StorageStatus {
        Self::round_trip(
            &self.channels.set_storage,
            SetStorage {
                address: *address,
                key: *key,
                value: *value,
            },
        )
    }

    fn get_balance(&self, address: &Address) -> Word256 {
        Self::round_trip(
            &self.channels.get_balance,
            GetBalance { address: *address },
        )
    }

    fn get_code_size(&self, address: &Address) -> usize {
        Self::round_trip(
            &self.channels.get_code_size,
            GetCodeSize { address: *address },
        )
    }

    fn get_code_hash(&self, address: &Address) -> Word256 {
        Self::round_trip(
            &self.channels.get_code_hash,
            GetCodeHash { address: *address },
        )
    }

    fn copy_code(&self, address: &Address, code_offset: usize, buffer: &mut [u8]) -> usize {
        let code = Self::round_trip(
            &self.channels.copy_code,
            CopyCode {
                address: *address,
                code_offset,
                capacity: buffer.len(),
            },
        );
        buffer[..code.len()].copy_from_slice(&code);
        code.len()
    }

    fn selfdestruct(&self, address: &Address, beneficiary: &Address) {
        Self::round_trip(
            &self.channels.selfdestruct,
            SelfDestruct {
                address: *address,
                beneficiary: *beneficiary,
            },
        );
    }

    fn call(&self, message: &Message) -> ExecutionResult {
        Self::round_trip(
            &self.channels.call,
            Call {
                message: message.clone(),
            },
        )
    }

    fn get_tx_context(&self) -> TxContext {
        Self::round_trip(&self.channels.get_tx_context, GetTxContext)
    }

    fn get_block_hash(&self, number: u64) -> Word256 {
        Self::round_trip(&self.channels.get_block_hash, GetBlockHash { number })
    }

    fn emit_log(&self, address: &Address, data: &[u8], topics: &[Word256]) {
        Self::round_trip(
            &self.channels.emit_log,
            EmitLog {
                address: *address,
                data: data.to_vec(),
                topics: topics.to_vec(),
            },
        );
    }

    fn access_account(&self, address: &Address) -> AccessStatus {
        Self::round_trip(
            &self.channels.access_account,
            AccessAccount { address: *address },
        )
    }

    fn access_storage(&self, address: &Address, key: &Word256) -> AccessStatus {
        Self::round_trip(
            &self.channels.access_storage,
            AccessStorage {
                address: *address,
                key: *key,
            },
        )
    }
}
