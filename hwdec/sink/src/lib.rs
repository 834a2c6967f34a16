/*!
    Output side of the hwdec harness.

    This crate takes the frames a [`DecoderSession`](hwdec_decode::DecoderSession)
    hands out and does something observable with them: dumps the visible
    planes to a raw file, folds them into an MD5 digest that can be checked
    against a reference, and writes extracted SEI payloads.

    # Basic Usage

    ```ignore
    use hwdec_sink::{FrameSink, SinkConfig};

    let sink = FrameSink::new(&SinkConfig::dump_to("out.yuv").with_checksum(true));
    session.set_reconfigure_flush(Box::new(sink.clone()), sink.flush_mode());

    for (payload, pts) in packets {
        session.decode(&SourcePacket::new(&payload, pts))?;
        while let Some(frame) = session.get_frame() {
            let Some(info) = session.output_surface_info() else { break };
            sink.consume(&frame, &info, session.take_reconfigured())?;
            session.release_frame(&frame)?;
        }
    }

    let report = sink.finish()?;
    println!("{:?}", report.digest);
    ```

    # Reconfiguration

    When the stream changes resolution, the session drains the frames it
    still holds through the sink registered with
    [`set_reconfigure_flush`](hwdec_decode::DecoderSession::set_reconfigure_flush).
    Dumping takes precedence over checksumming for those frames, see
    [`SinkConfig::flush_mode`]. The first frame after the change is written
    to a new file named after the new output size.

    # SEI

    ```ignore
    session.set_sei_sink(Box::new(SeiWriter::create("out.sei")?));
    ```
*/

mod checksum;
mod config;
mod flush;
mod sei;
mod writer;

pub use checksum::{FrameChecksum, verify_against_file};
pub use config::SinkConfig;
pub use flush::{FrameSink, SinkReport};
pub use sei::SeiWriter;
pub use writer::FrameWriter;
