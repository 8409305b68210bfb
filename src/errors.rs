use std::result;

quick_error! {
    #[derive(Debug)]
    pub enum ProtoError {
        // Following is for From other errors.
        Io(err: std::io::Error) {
            from()
            cause(err)
            display("Io {}", err)
        }
        Sql(err: rusqlite::Error) {
            from()
            cause(err)
            display("Sql {}", err)
        }
        // Framing
        EmptyPacketError {
            display("Empty packet error")
        }
        MultiPacketNotSupport {
            display("Multi packet not support")
        }
        // Handshake response
        ReadClientFlagError {
            display("Read client flags error when unpacking packets")
        }
        ProtocolNotSupport {
            display("Only support protocol 4.1")
        }
        ReadMaxPacketSizeError {
            display("Read max packet size error when unpacking packets")
        }
        ReadCharsetError {
            display("Read charset error when unpacking packets")
        }
        ReadZeroError {
            display("Read zero error when unpacking packets")
        }
        ReadUserError {
            display("Read user error when unpacking packets")
        }
        ReadAuthResponseError {
            display("Read auth response error when unpacking packets")
        }
        ReadAuthResponseLengthError {
            display("Read auth response length error when unpacking packets")
        }
        ReadDatabaseError {
            display("Read database error when unpacking packets")
        }
        // Greeting
        ReadProtocolVersionError {
            display("Read protocol version error when unpacking packets")
        }
        ReadServerVersionError {
            display("Read server version error when unpacking packets")
        }
        ReadConnectionIdError {
            display("Read connection id error when unpacking packets")
        }
        ReadSaltError {
            display("Read salt error when unpacking packets")
        }
        ReadCapabilityFlagError {
            display("Read capability flag error when unpacking packets")
        }
        ReadStatusFlagError {
            display("Read status flag error when unpacking packets")
        }
        // Command loop control
        ComQuit {
            display("Com Quit")
        }
    }
}

pub type ProtoResult<T> = result::Result<T, ProtoError>;
